//! WebSocket transport
//!
//! One task per direction: the reader feeds inbound text frames to the handler
//! and enforces the idle timeout, the writer drains the outbound queue and
//! pings. Whichever finishes first tears down the other, then the handler hears
//! a single disconnect.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket},
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{
    model::connection::Outbound,
    transport::{dispatch_text, Liveness, SignalHandler},
};

pub async fn serve_socket(socket: WebSocket, handler: Arc<dyn SignalHandler>, liveness: Liveness) {
    let (outbound, mut outbound_rx) = Outbound::channel(liveness.outbound_buffer);
    let id = match handler.on_connect(outbound) {
        Ok(id) => id,
        Err(e) => {
            warn!("Refusing WebSocket client: {}", e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let mut ping = interval(liveness.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ping.tick().await;

        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let text = match frame.to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Client ({}) frame could not be encoded: {}", id, e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        debug!("Client ({}) send failed: {}", id, e);
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    let reader = handler.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            // Any frame, pongs included, proves the peer is alive.
            let message = match timeout(liveness.ping_timeout, ws_receiver.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => {
                    debug!("Client ({}) read failed: {}", id, e);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("Client ({}) timed out after {:?}", id, liveness.ping_timeout);
                    break;
                }
            };

            match message {
                Message::Text(text) => dispatch_text(reader.as_ref(), id, text.as_str()),
                Message::Binary(_) => debug!("Client ({}) sent a binary frame, ignoring", id),
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    handler.on_disconnect(id);
}
