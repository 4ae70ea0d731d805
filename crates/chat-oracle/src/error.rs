//! Oracle errors.

use std::fmt::Write as _;
use std::time::Duration;

use thiserror::Error;

/// Why an expectation failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    /// No expected delivery arrived within the rolling window.
    #[error("timed out after {timeout:?}; {} expected message(s) never arrived:{}", .remaining.len(), dump(.remaining))]
    Timeout {
        /// The rolling window.
        timeout: Duration,
        /// Unmet deliveries, one entry per outstanding count.
        remaining: Vec<String>,
    },

    /// A delivery arrived that was not (or no longer) expected.
    #[error("unexpected message {delivery}; still waiting for:{}", dump(.remaining))]
    Unexpected {
        /// Canonical form of the stray delivery.
        delivery: String,
        /// Unmet deliveries at that moment.
        remaining: Vec<String>,
    },

    /// A delivery arrived while nothing was expected.
    #[error("no messages expected at this point, got {delivery}")]
    NoActiveExpectation {
        /// Canonical form of the stray delivery.
        delivery: String,
    },

    /// `expect` was called while another expectation was armed.
    #[error("an expectation is already active")]
    AlreadyActive,

    /// A recipient or message could not be converted to JSON.
    #[error("cannot encode delivery: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for OracleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e.to_string())
    }
}

fn dump(remaining: &[String]) -> String {
    if remaining.is_empty() {
        return " (none)".into();
    }
    let mut out = String::new();
    for entry in remaining {
        let _ = write!(out, "\n  {entry}");
    }
    out
}
