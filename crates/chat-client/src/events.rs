//! Notifications from the connection driver.

use chat_core::{ConnectionId, DisconnectReason};
use serde_json::Value;

/// Something happened on the client's connection.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// Handshake complete.
    Connected {
        /// Identity assigned by the server.
        id: ConnectionId,
        /// Identity of the previous connection instance, after a reconnect.
        previous: Option<ConnectionId>,
    },
    /// A broadcast arrived.
    Message(Value),
    /// The connection went away.
    Disconnected {
        /// Why.
        reason: DisconnectReason,
    },
    /// Transport or protocol failure. Informational.
    Error(String),
    /// About to retry; `n` is 1-based within the current outage.
    ReconnectAttempt(u32),
}
