//! Settings types with compiled defaults.

use std::time::Duration;

use chat_logging::{LogFormat, LogLevel};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Server bind address and connection limits.
    pub server: ServerSettings,
    /// Client reconnect policy.
    pub client: ClientSettings,
    /// Test oracle defaults.
    pub oracle: OracleSettings,
    /// Log level and format.
    pub logging: LoggingSettings,
}

impl ChatSettings {
    /// WebSocket URL a client should connect to.
    pub fn server_url(&self) -> String {
        format!("ws://{}:{}/ws", self.server.host, self.server.port)
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.server.outbound_queue_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.outboundQueueSize must be at least 1".into(),
            ));
        }
        if self.client.reconnect_initial_ms > self.client.reconnect_max_ms {
            return Err(SettingsError::InvalidValue(format!(
                "client.reconnectInitialMs ({}) exceeds client.reconnectMaxMs ({})",
                self.client.reconnect_initial_ms, self.client.reconnect_max_ms
            )));
        }
        if self.oracle.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "oracle.timeoutMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Server settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Host name or IP address to bind / connect to.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-connection outbound frame queue.
    pub outbound_queue_size: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds without a pong before a client is dropped.
    pub pong_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3000,
            max_connections: 1024,
            outbound_queue_size: 256,
            ping_interval_secs: 25,
            pong_timeout_secs: 60,
        }
    }
}

/// Client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Delay before the first reconnect attempt.
    pub reconnect_initial_ms: u64,
    /// Upper bound for the exponential backoff.
    pub reconnect_max_ms: u64,
    /// Give up after this many attempts; `None` retries forever.
    pub reconnect_max_attempts: Option<u32>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            reconnect_initial_ms: 1000,
            reconnect_max_ms: 5000,
            reconnect_max_attempts: None,
        }
    }
}

/// Message oracle settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OracleSettings {
    /// Rolling timeout between matched messages.
    pub timeout_ms: u64,
}

impl OracleSettings {
    /// Rolling timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self { timeout_ms: 1000 }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (overridden by `RUST_LOG`).
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ChatSettings::default();
        assert_eq!(s.server.host, "localhost");
        assert_eq!(s.server.port, 3000);
        assert_eq!(s.client.reconnect_initial_ms, 1000);
        assert_eq!(s.client.reconnect_max_ms, 5000);
        assert!(s.client.reconnect_max_attempts.is_none());
        assert_eq!(s.oracle.timeout(), Duration::from_millis(1000));
        assert_eq!(s.logging.level, LogLevel::Info);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn server_url_includes_ws_path() {
        let s = ChatSettings::default();
        assert_eq!(s.server_url(), "ws://localhost:3000/ws");
    }

    #[test]
    fn camel_case_wire_names() {
        let json = serde_json::to_value(ChatSettings::default()).unwrap();
        assert_eq!(json["server"]["maxConnections"], 1024);
        assert_eq!(json["client"]["reconnectInitialMs"], 1000);
        assert_eq!(json["oracle"]["timeoutMs"], 1000);
        assert_eq!(json["logging"]["format"], "pretty");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ChatSettings = serde_json::from_str(r#"{"server":{"port":4000}}"#).unwrap();
        assert_eq!(s.server.port, 4000);
        assert_eq!(s.server.host, "localhost");
        assert_eq!(s.client, ClientSettings::default());
    }

    #[test]
    fn validate_rejects_inverted_backoff() {
        let mut s = ChatSettings::default();
        s.client.reconnect_initial_ms = 10_000;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("reconnectInitialMs"));
    }

    #[test]
    fn validate_rejects_zero_queue() {
        let mut s = ChatSettings::default();
        s.server.outbound_queue_size = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_oracle_timeout() {
        let mut s = ChatSettings::default();
        s.oracle.timeout_ms = 0;
        assert!(s.validate().is_err());
    }
}
