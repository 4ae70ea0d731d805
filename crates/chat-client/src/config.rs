//! Client configuration and reconnect backoff.

use std::time::Duration;

use chat_settings::{ChatSettings, ClientSettings};

/// Exponential backoff between reconnect attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Give up after this many attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based): `initial * 2^(attempt-1)`, capped at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Whether attempt `attempt` may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ReconnectPolicy {
    fn from(s: &ClientSettings) -> Self {
        Self {
            initial: Duration::from_millis(s.reconnect_initial_ms),
            max: Duration::from_millis(s.reconnect_max_ms),
            max_attempts: s.reconnect_max_attempts,
        }
    }
}

/// Everything a [`ChatClient`](crate::ChatClient) needs to run.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// `ws://host:port/ws`.
    pub url: String,
    /// Nick used for the greeting and for [`shout`](crate::ChatClient::shout).
    pub nick: String,
    /// Backoff between reconnect attempts.
    pub reconnect: ReconnectPolicy,
    /// Capacity of the event channel handed back by `connect`.
    pub event_buffer: usize,
}

impl ClientConfig {
    /// Config with the default reconnect policy.
    pub fn new(url: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            nick: nick.into(),
            reconnect: ReconnectPolicy::default(),
            event_buffer: 256,
        }
    }

    /// Config pointing at the server described by `settings`.
    pub fn from_settings(settings: &ChatSettings, nick: impl Into<String>) -> Self {
        Self {
            reconnect: ReconnectPolicy::from(&settings.client),
            ..Self::new(settings.server_url(), nick)
        }
    }

    /// Replace the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, max_ms: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms),
            max_attempts: None,
        }
    }

    #[test]
    fn delays_double_until_capped() {
        let p = policy(1000, 5000);
        let delays: Vec<u64> = (1..=5)
            .map(|n| u64::try_from(p.delay_for(n).as_millis()).unwrap())
            .collect();
        assert_eq!(delays, [1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let p = policy(1000, 5000);
        assert_eq!(p.delay_for(64), Duration::from_millis(5000));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn attempt_zero_uses_initial() {
        assert_eq!(policy(250, 5000).delay_for(0), Duration::from_millis(250));
    }

    #[test]
    fn unlimited_attempts_by_default() {
        let p = ReconnectPolicy::default();
        assert!(p.allows(1));
        assert!(p.allows(10_000));
        assert_eq!(p.initial, Duration::from_millis(1000));
        assert_eq!(p.max, Duration::from_millis(5000));
    }

    #[test]
    fn attempt_limit() {
        let p = ReconnectPolicy {
            max_attempts: Some(2),
            ..policy(10, 10)
        };
        assert!(p.allows(1));
        assert!(p.allows(2));
        assert!(!p.allows(3));
    }

    #[test]
    fn from_settings_uses_server_url() {
        let mut settings = ChatSettings::default();
        settings.server.host = "chat.local".into();
        settings.server.port = 4000;
        settings.client.reconnect_max_attempts = Some(3);

        let cfg = ClientConfig::from_settings(&settings, "nick1");
        assert_eq!(cfg.url, "ws://chat.local:4000/ws");
        assert_eq!(cfg.nick, "nick1");
        assert_eq!(cfg.reconnect.max_attempts, Some(3));
    }
}
