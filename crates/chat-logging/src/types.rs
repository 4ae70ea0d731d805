//! Logging configuration types.

use serde::{Deserialize, Serialize};

/// Minimum log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed entry/exit points.
    Trace,
    /// Intermediate values, decisions.
    Debug,
    /// Outcomes, lifecycle events.
    #[default]
    Info,
    /// Non-fatal issues.
    Warn,
    /// Errors.
    Error,
}

impl LogLevel {
    /// Directive string for an `EnvFilter`.
    #[must_use]
    pub const fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse case-insensitively; `None` for unknown names.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Parse case-insensitively, falling back to `Info`.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

/// Output format of the stderr layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse case-insensitively; `None` for unknown names.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" | "compact" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}
