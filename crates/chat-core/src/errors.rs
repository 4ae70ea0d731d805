//! Error types for session lifecycle and wire protocol.

use thiserror::Error;

use crate::session::{ConnectionState, Side};

/// Session lifecycle failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The requested state change is not part of the lifecycle.
    #[error("{side} session cannot move from {from} to {to}")]
    InvalidTransition {
        /// Which endpoint owns the session.
        side: Side,
        /// Current state.
        from: ConnectionState,
        /// Requested state.
        to: ConnectionState,
    },
}

/// Wire protocol failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame could not be encoded or decoded as JSON.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}
