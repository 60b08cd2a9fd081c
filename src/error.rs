//! Error types for the signaling relay and its launcher

use std::{io, process::ExitStatus, time::Duration};

use thiserror::Error;

/// Errors raised by the relay core.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Every connection id has already been handed out.
    #[error("connection id space exhausted")]
    IdsExhausted,
}

/// Why a single outbound frame did not reach its peer.
///
/// Never escalated to the sender; fan-out logs it and moves on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The peer's transport has already gone away.
    #[error("peer is gone")]
    Closed,

    /// The peer is not draining its outbound queue fast enough.
    #[error("outbound buffer full")]
    Full,
}

/// Errors from the long-polling transport.
#[derive(Error, Debug)]
pub enum PollError {
    /// The session id was never issued, or the session has been closed.
    #[error("unknown session")]
    UnknownSession,

    /// The request body is not a signaling envelope.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Errors that stop the launcher before a client view can be opened.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to locate the current executable: {0}")]
    CurrentExe(#[source] io::Error),

    /// The server process could not be started at all.
    #[error("failed to start server process: {0}")]
    Spawn(#[source] io::Error),

    #[error("server exited before accepting connections ({0})")]
    Exited(ExitStatus),

    #[error("server did not become ready within {0:?}")]
    Timeout(Duration),

    #[error("failed to supervise server process: {0}")]
    Wait(#[source] io::Error),
}
