//! Attached peers
//!
//! A [`Connection`] is one peer whose transport handshake has completed: the id
//! the registry handed out, plus the outbound half of its transport.

use std::{fmt, num::ParseIntError, ops::Deref, str::FromStr};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{error::DeliveryError, model::payload::Frame};

/// Opaque identifier of a live connection. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl Deref for ConnectionId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ConnectionId)
    }
}

/// Outbound half of a peer's transport.
///
/// Backed by a bounded queue drained by the transport task. Pushing never
/// waits: a full queue drops the frame for this peer only.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Frame>,
}

impl Outbound {
    /// Create an outbound handle together with the receiver its transport drains.
    pub fn channel(capacity: usize) -> (Outbound, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Outbound { tx }, rx)
    }

    pub fn send(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub outbound: Outbound,
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(id: ConnectionId, outbound: Outbound) -> Connection {
        Connection {
            id,
            outbound,
            connected_at: Utc::now(),
        }
    }

    /// How long the peer has been attached, for disconnect logging.
    pub fn connected_for(&self) -> String {
        (Utc::now() - self.connected_at).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payload::Event;

    #[test]
    fn connection_id_round_trips_through_its_text_form() {
        let id = ConnectionId(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<ConnectionId>().unwrap(), id);
        assert!("not-a-number".parse::<ConnectionId>().is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_waiting() {
        let (outbound, mut rx) = Outbound::channel(1);
        let frame = Frame::new(Event::Offer, "sdp");

        assert_eq!(outbound.send(frame.clone()), Ok(()));
        assert_eq!(outbound.send(frame.clone()), Err(DeliveryError::Full));

        assert_eq!(rx.recv().await, Some(frame));
    }

    #[test]
    fn send_after_receiver_dropped_reports_closed() {
        let (outbound, rx) = Outbound::channel(4);
        drop(rx);

        assert_eq!(
            outbound.send(Frame::peer_disconnected()),
            Err(DeliveryError::Closed)
        );
    }
}
