//! Signaling relay
//!
//! Forwards frames between peers according to [`Propagated::route`] and tells
//! the remaining peers when one leaves. The relay keeps no negotiation state;
//! the offer/answer state machine lives on the peers.

use tracing::{debug, info};

use crate::{
    error::RelayError,
    model::{
        connection::{ConnectionId, Outbound},
        payload::Frame,
        propagated::Propagated,
    },
    registry::ConnectionRegistry,
    transport::SignalHandler,
};

#[derive(Debug, Default)]
pub struct Relay {
    registry: ConnectionRegistry,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn connect(&self, outbound: Outbound) -> Result<ConnectionId, RelayError> {
        let id = self.registry.add(outbound)?;
        info!("Client connected: {}", id);
        Ok(id)
    }

    /// Forward a frame from `from`. Returns the number of peers it reached.
    pub fn message(&self, from: ConnectionId, frame: Frame) -> usize {
        if !self.registry.contains(from) {
            debug!("Dropping {:?} from departed client ({})", frame.event, from);
            return 0;
        }
        self.propagate(Propagated::route(from, frame))
    }

    /// Drop a connection and notify everyone else. Idempotent: only the call
    /// that actually removes the connection sends notifications.
    pub fn disconnect(&self, id: ConnectionId) -> usize {
        let Some(connection) = self.registry.remove(id) else {
            return 0;
        };
        info!(
            "Client disconnected: {} (connected for {})",
            id,
            connection.connected_for()
        );

        let notice = Frame::peer_disconnected();
        self.registry
            .for_each_other(id, |c| c.outbound.send(notice.clone()))
    }

    /// Push one frame to one peer. A missing peer is not an error.
    pub fn send(&self, id: ConnectionId, frame: Frame) -> bool {
        match self.registry.get(id) {
            Some(connection) => connection.outbound.send(frame).is_ok(),
            None => false,
        }
    }

    fn propagate(&self, propagated: Propagated) -> usize {
        match propagated {
            Propagated::Noop => 0,
            Propagated::Others(origin, frame) => self
                .registry
                .for_each_other(origin, |c| c.outbound.send(frame.clone())),
            Propagated::All(_, frame) => self
                .registry
                .for_each_all(|c| c.outbound.send(frame.clone())),
        }
    }
}

impl SignalHandler for Relay {
    fn on_connect(&self, outbound: Outbound) -> Result<ConnectionId, RelayError> {
        self.connect(outbound)
    }

    fn on_message(&self, id: ConnectionId, frame: Frame) {
        self.message(id, frame);
    }

    fn on_disconnect(&self, id: ConnectionId) {
        self.disconnect(id);
    }

    fn connections(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc::Receiver;

    use super::*;
    use crate::model::payload::Event;

    struct Peer {
        id: ConnectionId,
        rx: Receiver<Frame>,
    }

    impl Peer {
        fn join(relay: &Relay) -> Peer {
            let (outbound, rx) = Outbound::channel(16);
            let id = relay.connect(outbound).unwrap();
            Peer { id, rx }
        }

        fn drain(&mut self) -> Vec<Frame> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                frames.push(frame);
            }
            frames
        }
    }

    #[test]
    fn negotiation_reaches_every_other_peer() {
        let relay = Relay::new();
        let mut peers: Vec<Peer> = (0..5).map(|_| Peer::join(&relay)).collect();

        for event in [Event::Offer, Event::Answer, Event::IceCandidate] {
            let delivered = relay.message(peers[0].id, Frame::new(event, "sdp"));
            assert_eq!(delivered, 4);
        }

        assert!(peers[0].drain().is_empty());
        for peer in &mut peers[1..] {
            let events: Vec<Event> = peer.drain().into_iter().map(|f| f.event).collect();
            assert_eq!(events, [Event::Offer, Event::Answer, Event::IceCandidate]);
        }
    }

    #[test]
    fn broadcast_reaches_everyone_including_the_sender() {
        let relay = Relay::new();
        let mut peers: Vec<Peer> = (0..4).map(|_| Peer::join(&relay)).collect();

        let delivered = relay.message(peers[2].id, Frame::new(Event::Broadcast, "hi"));
        assert_eq!(delivered, 4);

        for peer in &mut peers {
            assert_eq!(peer.drain(), vec![Frame::new(Event::Broadcast, "hi")]);
        }
    }

    #[test]
    fn disconnect_notifies_the_others_once() {
        let relay = Relay::new();
        let mut a = Peer::join(&relay);
        let mut b = Peer::join(&relay);
        let mut c = Peer::join(&relay);

        assert_eq!(relay.disconnect(a.id), 2);
        assert_eq!(relay.disconnect(a.id), 0);

        assert!(a.drain().is_empty());
        assert_eq!(b.drain(), vec![Frame::peer_disconnected()]);
        assert_eq!(c.drain(), vec![Frame::peer_disconnected()]);
        assert_eq!(relay.registry().len(), 2);
    }

    #[test]
    fn forged_disconnect_notices_go_nowhere() {
        let relay = Relay::new();
        let a = Peer::join(&relay);
        let mut b = Peer::join(&relay);

        assert_eq!(relay.message(a.id, Frame::peer_disconnected()), 0);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn departed_senders_are_ignored() {
        let relay = Relay::new();
        let a = Peer::join(&relay);
        let mut b = Peer::join(&relay);
        relay.disconnect(a.id);
        b.drain();

        assert_eq!(relay.message(a.id, Frame::new(Event::Offer, "late")), 0);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn send_to_a_missing_peer_is_a_no_op() {
        let relay = Relay::new();
        let mut a = Peer::join(&relay);

        assert!(relay.send(a.id, Frame::new(Event::Broadcast, 1)));
        relay.disconnect(a.id);
        assert!(!relay.send(a.id, Frame::new(Event::Broadcast, 2)));

        assert_eq!(a.drain(), vec![Frame::new(Event::Broadcast, 1)]);
    }

    #[test]
    fn dead_peer_does_not_block_the_rest() {
        let relay = Relay::new();
        let a = Peer::join(&relay);
        let b = Peer::join(&relay);
        let mut c = Peer::join(&relay);
        // b's transport is gone but its disconnect has not been processed yet.
        drop(b.rx);

        assert_eq!(relay.message(a.id, Frame::new(Event::Offer, "x")), 1);
        assert_eq!(c.drain(), vec![Frame::new(Event::Offer, "x")]);
    }

    #[test]
    fn three_peer_scenario() {
        let relay = Relay::new();
        let mut c1 = Peer::join(&relay);
        let mut c2 = Peer::join(&relay);
        let mut c3 = Peer::join(&relay);

        relay.message(c1.id, Frame::new(Event::Offer, "sdp-A"));
        assert_eq!(c2.drain(), vec![Frame::new(Event::Offer, "sdp-A")]);
        assert_eq!(c3.drain(), vec![Frame::new(Event::Offer, "sdp-A")]);
        assert!(c1.drain().is_empty());

        relay.disconnect(c2.id);
        assert_eq!(c1.drain(), vec![Frame::peer_disconnected()]);
        assert_eq!(c3.drain(), vec![Frame::peer_disconnected()]);

        relay.message(c3.id, Frame::new(Event::Broadcast, "hello"));
        assert_eq!(c1.drain(), vec![Frame::new(Event::Broadcast, "hello")]);
        assert_eq!(c3.drain(), vec![Frame::new(Event::Broadcast, "hello")]);
        assert!(c2.drain().is_empty());
    }

    #[test]
    fn payloads_pass_through_untouched() {
        let relay = Relay::new();
        let a = Peer::join(&relay);
        let mut b = Peer::join(&relay);

        for text in [
            r#"{"event":"offer","data":null}"#,
            r#"{"event":"offer","data":123456789012345678901234567890}"#,
            "{\"event\":\"offer\",\"data\":{ \"sdp\" : \"v=0\\r\\n\",\n \"weird\":[null, {\"x\":1.50}] }}",
        ] {
            relay.message(a.id, Frame::parse(text).unwrap());
            let relayed: Vec<String> = b.drain().iter().map(|f| f.to_text().unwrap()).collect();
            assert_eq!(relayed, vec![text.to_string()]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_never_breaks_fan_out() {
        let relay = Arc::new(Relay::new());
        let mut tasks = Vec::new();

        for n in 0..32 {
            let relay = relay.clone();
            tasks.push(tokio::spawn(async move {
                for round in 0..50 {
                    let (outbound, mut rx) = Outbound::channel(8);
                    let id = relay.connect(outbound).unwrap();
                    let event = if (n + round) % 4 == 0 {
                        Event::Broadcast
                    } else {
                        Event::IceCandidate
                    };
                    relay.message(id, Frame::new(event, round));
                    tokio::task::yield_now().await;
                    if round % 2 == 0 {
                        drop(rx.try_recv());
                    } else {
                        // Peer vanishes before its disconnect is processed.
                        drop(rx);
                    }
                    relay.disconnect(id);
                    relay.disconnect(id);
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert!(relay.registry().is_empty());
    }
}
