//! WebRTC signaling relay
//!
//! Peers exchange session descriptions and ICE candidates through this server
//! so they can set up a direct connection. All connected peers share a single
//! broadcast domain: `offer`, `answer` and `ice-candidate` go to every other
//! peer, `broadcast` goes to everyone including the sender, and a leaving peer
//! triggers `peer-disconnected` for the rest.
//!
//! Peers attach over a WebSocket at `/signal`, or over HTTP long-polling at
//! `/signal/poll` when they cannot upgrade. See [`server`] for the routes.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod launcher;
pub mod model;
pub mod registry;
pub mod relay;
pub mod server;
pub mod transport;
pub mod util;

pub use error::{DeliveryError, LaunchError, PollError, RelayError};
pub use model::{
    connection::{ConnectionId, Outbound},
    payload::{Event, Frame},
};
pub use relay::Relay;
