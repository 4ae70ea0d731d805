//! Wire protocol shared by client and server.
//!
//! Every WebSocket text frame is one JSON [`Frame`], tagged by `event`:
//!
//! - `connected` (server → client): handshake complete, carries the assigned identity
//! - `command` (client → server): a named [`Command`] with an arbitrary payload
//! - `message` (server → client): a broadcast payload, passed through untouched

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::ids::ConnectionId;

/// Command name that broadcasts its payload to every connected client.
pub const SHOUT_TO_ALL: &str = "shout-to-all";

/// Text a client shouts automatically when its connection comes up.
pub const GREETING_TEXT: &str = "Hello world!";

/// Chat line carried by `shout-to-all`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender's nick name.
    pub nick: String,
    /// Message body.
    pub text: String,
}

impl ChatMessage {
    /// Build a chat line.
    pub fn new(nick: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            text: text.into(),
        }
    }

    /// The automatic on-connect greeting for `nick`.
    pub fn greeting(nick: impl Into<String>) -> Self {
        Self::new(nick, GREETING_TEXT)
    }
}

/// One WebSocket text frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Frame {
    /// Handshake complete; `client_id` is the connection's identity.
    Connected {
        /// Identity assigned to this connection instance.
        #[serde(rename = "clientId")]
        client_id: ConnectionId,
    },
    /// Client → server command.
    Command {
        /// Command name.
        name: String,
        /// Arbitrary payload.
        #[serde(default)]
        payload: Value,
    },
    /// Server → client broadcast.
    Message {
        /// Broadcast payload.
        payload: Value,
    },
}

impl Frame {
    /// Encode as JSON text.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A named command, resolved against the set of known names.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Broadcast the payload to every connected session.
    ShoutToAll(Value),
    /// Any name the server does not know. Inert.
    Unknown {
        /// The unrecognized name.
        name: String,
        /// Its payload.
        payload: Value,
    },
}

impl Command {
    /// Resolve a wire `(name, payload)` pair.
    pub fn parse(name: &str, payload: Value) -> Self {
        match name {
            SHOUT_TO_ALL => Self::ShoutToAll(payload),
            _ => Self::Unknown {
                name: name.to_owned(),
                payload,
            },
        }
    }

    /// `shout-to-all` with a serializable payload.
    pub fn shout_to_all(payload: &impl Serialize) -> Result<Self, ProtocolError> {
        Ok(Self::ShoutToAll(serde_json::to_value(payload)?))
    }

    /// Wire name.
    pub fn name(&self) -> &str {
        match self {
            Self::ShoutToAll(_) => SHOUT_TO_ALL,
            Self::Unknown { name, .. } => name,
        }
    }

    /// Payload.
    pub fn payload(&self) -> &Value {
        match self {
            Self::ShoutToAll(payload) | Self::Unknown { payload, .. } => payload,
        }
    }
}

impl From<Command> for Frame {
    fn from(command: Command) -> Self {
        match command {
            Command::ShoutToAll(payload) => Frame::Command {
                name: SHOUT_TO_ALL.to_owned(),
                payload,
            },
            Command::Unknown { name, payload } => Frame::Command { name, payload },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn parse_known_command() {
        let cmd = Command::parse("shout-to-all", json!({"nick": "a", "text": "b"}));
        assert_matches!(cmd, Command::ShoutToAll(ref p) if p["nick"] == "a");
        assert_eq!(cmd.name(), SHOUT_TO_ALL);
    }

    #[test]
    fn parse_unknown_command_is_fallthrough() {
        let cmd = Command::parse("whisper", json!(1));
        assert_eq!(
            cmd,
            Command::Unknown {
                name: "whisper".into(),
                payload: json!(1)
            }
        );
        assert_eq!(cmd.name(), "whisper");
        assert_eq!(cmd.payload(), &json!(1));
    }

    #[test]
    fn shout_to_all_from_chat_message() {
        let cmd = Command::shout_to_all(&ChatMessage::new("nick1", "hi")).unwrap();
        assert_eq!(cmd.payload(), &json!({"nick": "nick1", "text": "hi"}));
    }

    #[test]
    fn command_frame_wire_shape() {
        let frame: Frame = Command::shout_to_all(&ChatMessage::greeting("nick1"))
            .unwrap()
            .into();
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "command");
        assert_eq!(value["name"], "shout-to-all");
        assert_eq!(value["payload"]["text"], "Hello world!");
    }

    #[test]
    fn connected_frame_uses_client_id_key() {
        let frame = Frame::Connected {
            client_id: ConnectionId::from_raw("conn_1"),
        };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "connected", "clientId": "conn_1"}));
    }

    #[test]
    fn message_frame_decodes() {
        let frame = Frame::from_json(r#"{"event":"message","payload":{"nick":"n","text":"t"}}"#)
            .unwrap();
        assert_eq!(
            frame,
            Frame::Message {
                payload: json!({"nick": "n", "text": "t"})
            }
        );
    }

    #[test]
    fn command_without_payload_defaults_to_null() {
        let frame = Frame::from_json(r#"{"event":"command","name":"ping"}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Command {
                name: "ping".into(),
                payload: Value::Null
            }
        );
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(Frame::from_json(r#"{"event":"nope"}"#).is_err());
        assert!(Frame::from_json("not json").is_err());
    }

    #[test]
    fn unknown_command_survives_frame_conversion() {
        let frame: Frame = Command::parse("future-cmd", json!([1, 2])).into();
        assert_eq!(
            frame,
            Frame::Command {
                name: "future-cmd".into(),
                payload: json!([1, 2])
            }
        );
    }
}
