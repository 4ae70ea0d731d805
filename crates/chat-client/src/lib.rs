//! # chat-client
//!
//! WebSocket client for the broadcast chat.
//!
//! [`ChatClient::connect`] returns immediately and drives the connection in a
//! background task: it handshakes, shouts a greeting on every (re)connect,
//! reconnects with exponential backoff, and reports everything as
//! [`ClientEvent`]s.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod events;

pub use client::ChatClient;
pub use config::{ClientConfig, ReconnectPolicy};
pub use error::ClientError;
pub use events::ClientEvent;
