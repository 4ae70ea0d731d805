//! WebSocket transport: per-connection state, fan-out, command dispatch and the session loop.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod session;
