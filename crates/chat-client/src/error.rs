//! Client error types.

use chat_core::{ConnectionState, ProtocolError};
use thiserror::Error;

/// Errors returned to callers of [`ChatClient`](crate::ChatClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Commands are only accepted while `Connected`.
    #[error("not connected (session is {state})")]
    NotConnected {
        /// State the session was in when the command was submitted.
        state: ConnectionState,
    },

    /// The client was closed; its background task is gone.
    #[error("client closed")]
    Closed,

    /// The payload could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
