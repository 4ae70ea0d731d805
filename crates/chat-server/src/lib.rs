//! # chat-server
//!
//! Axum HTTP + `WebSocket` server for the broadcast chat.
//!
//! - `WebSocket` gateway at `/ws`: handshake, per-connection session lifecycle, ping/pong
//! - Command dispatch: `shout-to-all` fans out, unknown names are logged and ignored
//! - Broadcast to every connected session, sender included
//! - `/health` endpoint with the live connection count
//! - Graceful shutdown that waits for the accept loop and every live session

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::ChatServer;
pub use shutdown::{Drained, ShutdownCoordinator};
pub use websocket::broadcast::BroadcastManager;
