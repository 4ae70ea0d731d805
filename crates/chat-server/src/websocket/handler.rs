//! Inbound frame dispatch: parse, gate on session state, route by command name.

use chat_core::{Command, Frame};
use tracing::{debug, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;

/// What handling one inbound frame did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A `message` frame was fanned out to `delivered` clients.
    Broadcast {
        /// Clients the frame was queued for.
        delivered: usize,
    },
    /// The frame was logged and dropped.
    Ignored,
}

/// Handle one inbound text frame from `origin`.
///
/// Malformed frames, non-command frames and commands on a session that is
/// not `Connected` are ignored. None of them tear the connection down.
#[instrument(skip_all, fields(client_id = %origin.id))]
pub async fn handle_text(
    text: &str,
    origin: &ClientConnection,
    broadcast: &BroadcastManager,
) -> DispatchOutcome {
    let frame = match Frame::from_json(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "ignoring malformed frame");
            return DispatchOutcome::Ignored;
        }
    };
    let Frame::Command { name, payload } = frame else {
        warn!("ignoring non-command frame from client");
        return DispatchOutcome::Ignored;
    };
    if !origin.is_connected() {
        warn!(state = %origin.state(), command = %name, "command on inactive session");
        return DispatchOutcome::Ignored;
    }
    dispatch(Command::parse(&name, payload), broadcast).await
}

/// Route a resolved command.
pub async fn dispatch(command: Command, broadcast: &BroadcastManager) -> DispatchOutcome {
    debug!(command = command.name(), payload = %command.payload(), "server received command");
    match command {
        Command::ShoutToAll(payload) => {
            let delivered = broadcast.broadcast_all(&Frame::Message { payload }).await;
            DispatchOutcome::Broadcast { delivered }
        }
        Command::Unknown { name, payload } => {
            warn!(command = %name, %payload, "unknown command");
            DispatchOutcome::Ignored
        }
    }
}
