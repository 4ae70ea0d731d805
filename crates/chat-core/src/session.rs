//! One endpoint's view of a single logical connection.
//!
//! ```text
//! Connecting ──► Connected ──► Disconnecting ──► Disconnected   (server)
//!     ▲              │
//!     └──────────────┘ reconnect                                (client)
//! ```
//!
//! `Disconnecting` exists only on the server, where it marks the window in
//! which the peer is tearing down but the session is still registered for
//! broadcast. `Connected → Connecting` exists only on the client, where the
//! transport retries after losing connectivity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::ids::ConnectionId;

/// Lifecycle state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Handshake pending. Initial state.
    Connecting,
    /// Handshake complete, identity assigned.
    Connected,
    /// Peer is tearing down; resources not yet released (server only).
    Disconnecting,
    /// Terminal for this connection instance.
    Disconnected,
}

impl ConnectionState {
    /// Whether commands may be sent or accepted in this state.
    pub fn accepts_commands(self) -> bool {
        self == Self::Connected
    }

    /// Whether this state ends the connection instance.
    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Which endpoint owns a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The connecting client.
    Client,
    /// The accepting server.
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Why a connection went away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer sent a close frame.
    PeerClosed,
    /// This side closed the connection deliberately.
    LocalClose,
    /// The underlying stream ended without a close frame.
    TransportClosed,
    /// The transport reported an error.
    TransportError(String),
    /// The peer stopped answering pings.
    PingTimeout,
    /// The server is shutting down.
    ServerShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("peer closed"),
            Self::LocalClose => f.write_str("local close"),
            Self::TransportClosed => f.write_str("transport close"),
            Self::TransportError(e) => write!(f, "transport error: {e}"),
            Self::PingTimeout => f.write_str("ping timeout"),
            Self::ServerShutdown => f.write_str("server shutting down"),
        }
    }
}

/// Connection state and identity for one endpoint.
#[derive(Clone, Debug)]
pub struct Session {
    side: Side,
    state: ConnectionState,
    id: Option<ConnectionId>,
    previous_id: Option<ConnectionId>,
}

impl Session {
    /// Create a session in the `Connecting` state.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            state: ConnectionState::Connecting,
            id: None,
            previous_id: None,
        }
    }

    /// Which endpoint owns this session.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity of the current connection instance, if connected.
    pub fn id(&self) -> Option<&ConnectionId> {
        self.id.as_ref()
    }

    /// Whether commands may flow on this session right now.
    pub fn is_connected(&self) -> bool {
        self.state.accepts_commands()
    }

    /// Whether `from → to` is a legal move for this side.
    pub fn allows(side: Side, from: ConnectionState, to: ConnectionState) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Disconnecting};
        match side {
            Side::Client => matches!(
                (from, to),
                (Connecting | Connected, Disconnected)
                    | (Connecting, Connected)
                    | (Connected, Connecting)
            ),
            Side::Server => matches!(
                (from, to),
                (Connecting | Disconnecting, Disconnected)
                    | (Connecting, Connected)
                    | (Connected, Disconnecting)
            ),
        }
    }

    /// Move to `next`, returning the previous state.
    pub fn transition(&mut self, next: ConnectionState) -> Result<ConnectionState, SessionError> {
        if !Self::allows(self.side, self.state, next) {
            return Err(SessionError::InvalidTransition {
                side: self.side,
                from: self.state,
                to: next,
            });
        }
        let prev = self.state;
        if prev == ConnectionState::Connected {
            self.previous_id = self.id.take();
        }
        self.state = next;
        Ok(prev)
    }

    /// Complete the handshake with a freshly assigned identity.
    ///
    /// Returns the identity of the previous connection instance, if any.
    pub fn mark_connected(
        &mut self,
        id: ConnectionId,
    ) -> Result<Option<ConnectionId>, SessionError> {
        let _ = self.transition(ConnectionState::Connected)?;
        self.id = Some(id);
        Ok(self.previous_id.take())
    }

    /// Connectivity lost; the transport will retry (client only).
    pub fn begin_reconnect(&mut self) -> Result<(), SessionError> {
        self.transition(ConnectionState::Connecting).map(|_| ())
    }

    /// Peer started tearing down (server only).
    pub fn begin_disconnecting(&mut self) -> Result<(), SessionError> {
        self.transition(ConnectionState::Disconnecting).map(|_| ())
    }

    /// Enter the terminal state. Idempotent.
    pub fn mark_disconnected(&mut self) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.transition(ConnectionState::Disconnected).map(|_| ())
    }
}
