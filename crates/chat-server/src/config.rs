//! Server configuration.

use std::time::Duration;

use chat_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the chat server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound frames buffered per connection before new ones are dropped.
    pub outbound_queue_size: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds without a pong before the client is dropped.
    pub pong_timeout_secs: u64,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ping interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Pong timeout.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            outbound_queue_size: 256,
            ping_interval_secs: 25,
            pong_timeout_secs: 60,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            outbound_queue_size: s.outbound_queue_size.max(1),
            ping_interval_secs: s.ping_interval_secs,
            pong_timeout_secs: s.pong_timeout_secs,
        }
    }
}
