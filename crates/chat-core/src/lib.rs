//! # chat-core
//!
//! Shared vocabulary for the broadcast chat server, client and test oracle:
//!
//! - **Branded IDs**: [`ConnectionId`], assigned per connection instance
//! - **Protocol**: [`Frame`] wire envelope, [`Command`] dispatch enum, [`ChatMessage`]
//! - **Session**: [`Session`] and the [`ConnectionState`] lifecycle
//! - **Multiset**: [`Bag`], an insertion-ordered counting collection
//! - **Errors**: [`SessionError`] and [`ProtocolError`] via `thiserror`

#![deny(unsafe_code)]

pub mod bag;
pub mod errors;
pub mod ids;
pub mod protocol;
pub mod session;

pub use bag::Bag;
pub use errors::{ProtocolError, SessionError};
pub use ids::ConnectionId;
pub use protocol::{ChatMessage, Command, Frame, GREETING_TEXT, SHOUT_TO_ALL};
pub use session::{ConnectionState, DisconnectReason, Session, Side};
