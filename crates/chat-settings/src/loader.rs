//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ChatSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `CHAT_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use chat_logging::{LogFormat, LogLevel};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::ChatSettings;

/// Resolve the path to the settings file (`~/.chat/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".chat").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ChatSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ChatSettings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// Load settings from `path`, resolving overrides through `lookup`.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<ChatSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(ChatSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ChatSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup)?;
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `CHAT_*` overrides resolved through `lookup`.
///
/// Empty values count as unset. Anything else that does not parse, or falls
/// outside its range, is a [`SettingsError::InvalidValue`] naming the key.
pub fn apply_overrides<F>(settings: &mut ChatSettings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("CHAT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("CHAT_PORT") {
        settings.server.port = strict("CHAT_PORT", &v, parse_u16_range(&v, 1, 65535))?;
    }
    if let Some(v) = read("CHAT_MAX_CONNECTIONS") {
        settings.server.max_connections = strict(
            "CHAT_MAX_CONNECTIONS",
            &v,
            parse_usize_range(&v, 1, 1_000_000),
        )?;
    }

    // ── Client ──────────────────────────────────────────────────────
    if let Some(v) = read("CHAT_RECONNECT_INITIAL_MS") {
        settings.client.reconnect_initial_ms = strict(
            "CHAT_RECONNECT_INITIAL_MS",
            &v,
            parse_u64_range(&v, 1, 600_000),
        )?;
    }
    if let Some(v) = read("CHAT_RECONNECT_MAX_MS") {
        settings.client.reconnect_max_ms = strict(
            "CHAT_RECONNECT_MAX_MS",
            &v,
            parse_u64_range(&v, 1, 3_600_000),
        )?;
    }
    if let Some(v) = read("CHAT_RECONNECT_MAX_ATTEMPTS") {
        let parsed = parse_u64_range(&v, 0, u64::from(u32::MAX)).and_then(|n| u32::try_from(n).ok());
        // 0 means unlimited
        settings.client.reconnect_max_attempts =
            Some(strict("CHAT_RECONNECT_MAX_ATTEMPTS", &v, parsed)?).filter(|&n| n > 0);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("CHAT_LOG_LEVEL") {
        settings.logging.level = strict("CHAT_LOG_LEVEL", &v, LogLevel::parse(&v))?;
    }
    if let Some(v) = read("CHAT_LOG_FORMAT") {
        settings.logging.format = strict("CHAT_LOG_FORMAT", &v, LogFormat::parse(&v))?;
    }
    Ok(())
}

fn strict<T>(key: &str, raw: &str, parsed: Option<T>) -> Result<T> {
    parsed.ok_or_else(|| {
        warn!(key, value = %raw, "invalid env override");
        SettingsError::InvalidValue(format!("{key}={raw:?}"))
    })
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
