//! # chat-logging
//!
//! Structured logging with `tracing`.
//!
//! Installs a global subscriber with an [`EnvFilter`](tracing_subscriber::EnvFilter)
//! (`RUST_LOG` takes precedence over the configured level) and a `fmt` layer
//! writing to stderr, either compact text or JSON lines.

#![deny(unsafe_code)]

pub mod types;

pub use types::{LogFormat, LogLevel};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Build the filter: `RUST_LOG` if set, otherwise `level`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()))
}

/// Install the global subscriber.
///
/// Fails if a global subscriber was already set.
pub fn try_init_subscriber(level: LogLevel, format: LogFormat) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
}

/// Install the global subscriber. Call once at startup; later calls are no-ops.
pub fn init_subscriber(level: LogLevel, format: LogFormat) {
    // already-set is fine: tests and embedded use may race to install one
    let _ = try_init_subscriber(level, format);
}
