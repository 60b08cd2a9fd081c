//! Data models for the signaling relay
//!
//! Connections, the frames peers exchange, and the fan-out decision made for
//! each inbound frame.

pub mod connection;
pub mod payload;
pub mod propagated;
