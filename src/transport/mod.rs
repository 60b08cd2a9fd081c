//! Transport endpoints
//!
//! A transport owns one peer's duplex channel. It reports the channel's life to
//! a [`SignalHandler`] (connect once, messages in the peer's send order,
//! disconnect once) and drains the peer's [`Outbound`] queue back onto the wire.
//! The relay never sees which transport a peer used.

pub mod polling;
pub mod websocket;

use std::time::Duration;

use tracing::warn;

use crate::{
    error::RelayError,
    model::{
        connection::{ConnectionId, Outbound},
        payload::Frame,
    },
};

/// Receives connection lifecycle events from a transport.
pub trait SignalHandler: Send + Sync + 'static {
    /// The peer's channel became usable. Returns the id its events will carry.
    fn on_connect(&self, outbound: Outbound) -> Result<ConnectionId, RelayError>;

    fn on_message(&self, id: ConnectionId, frame: Frame);

    /// The channel closed, by peer action, network failure, or idle timeout.
    fn on_disconnect(&self, id: ConnectionId);

    /// Number of live connections.
    fn connections(&self) -> usize;
}

/// Timing and buffering shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// How often the server pings an idle WebSocket peer.
    pub ping_interval: Duration,
    /// Silence after which a peer is considered gone.
    pub ping_timeout: Duration,
    /// How long a poll request waits for frames before returning empty.
    /// See [`Liveness::poll_window`].
    pub poll_wait: Duration,
    /// Outbound frames queued per peer before new ones are dropped.
    pub outbound_buffer: usize,
}

impl Default for Liveness {
    fn default() -> Self {
        Liveness {
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(60),
            poll_wait: Duration::from_secs(20),
            outbound_buffer: 64,
        }
    }
}

impl Liveness {
    /// How long one poll may actually wait: `poll_wait`, capped at half the
    /// ping timeout so a waiting poller is never reaped mid-request.
    pub fn poll_window(&self) -> Duration {
        self.poll_wait.min(self.ping_timeout / 2)
    }
}

/// Parse one inbound text frame and hand it to the handler. Garbage is logged
/// and dropped; the connection stays open.
pub(crate) fn dispatch_text(handler: &dyn SignalHandler, id: ConnectionId, text: &str) {
    match Frame::parse(text) {
        Ok(frame) => handler.on_message(id, frame),
        Err(e) => warn!("Client ({}) sent an invalid frame: {}", id, e),
    }
}
