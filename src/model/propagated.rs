//! Fan-out decisions
//!
//! Turns one inbound frame into the set of peers it should reach. This is the
//! relay's whole dispatch table; nothing here touches the registry.

use crate::model::{
    connection::ConnectionId,
    payload::{Event, Frame},
};

/// Where an inbound frame goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Propagated {
    /// Nothing to deliver.
    Noop,

    /// Deliver to every connection except the originating one.
    Others(ConnectionId, Frame),

    /// Deliver to every connection, the originating one included.
    All(ConnectionId, Frame),
}

impl Propagated {
    /// Route a frame received from `origin`.
    ///
    /// Negotiation events skip the sender so a peer never receives its own
    /// offer or answer back. `broadcast` is an announcement and includes the
    /// sender. Peers may not originate `peer-disconnected`.
    pub fn route(origin: ConnectionId, frame: Frame) -> Propagated {
        match frame.event {
            Event::Offer | Event::Answer | Event::IceCandidate => Propagated::Others(origin, frame),
            Event::Broadcast => Propagated::All(origin, frame),
            Event::PeerDisconnected => Propagated::Noop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_events_exclude_the_sender() {
        let origin = ConnectionId(7);
        for event in [Event::Offer, Event::Answer, Event::IceCandidate] {
            let frame = Frame::new(event, "payload");
            assert_eq!(
                Propagated::route(origin, frame.clone()),
                Propagated::Others(origin, frame)
            );
        }
    }

    #[test]
    fn broadcast_includes_the_sender() {
        let origin = ConnectionId(7);
        let frame = Frame::new(Event::Broadcast, "hello");
        let routed = Propagated::route(origin, frame.clone());

        assert_eq!(routed, Propagated::All(origin, frame));
    }

    #[test]
    fn peers_cannot_forge_disconnect_notices() {
        let routed = Propagated::route(ConnectionId(1), Frame::peer_disconnected());
        assert_eq!(routed, Propagated::Noop);
    }
}
