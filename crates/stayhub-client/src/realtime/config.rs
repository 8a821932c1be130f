//! Real-time channel configuration.

use std::time::Duration;

use stayhub_core::config::{ApiConfig, ChatSettings};

/// Configuration for the WebSocket connection carrying chat traffic.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket URL (e.g., "ws://localhost:8080/ws").
    pub ws_url: String,

    /// Bearer token sent in the STOMP CONNECT frame.
    pub token: Option<String>,

    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,

    /// STOMP heart-beat interval. Zero disables heart-beats.
    pub heartbeat_interval: Duration,

    /// How long to wait for the server's CONNECTED frame.
    pub connect_timeout: Duration,
}

/// Reconnection policy. The default retries forever every 5 seconds.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnect attempts.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Maximum number of reconnect attempts (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            multiplier: 1.0,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay for a given attempt number (0-indexed).
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = base_ms * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Whether another attempt should be made.
    pub const fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }

    pub fn from_settings(settings: &ChatSettings) -> Self {
        let initial_delay = Duration::from_secs(settings.reconnect_interval_secs);
        Self {
            initial_delay,
            max_delay: Duration::from_secs(settings.reconnect_max_delay_secs).max(initial_delay),
            multiplier: settings.reconnect_multiplier.max(1.0),
            max_attempts: None,
        }
    }
}

impl RealtimeConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            token: None,
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_settings(api: &ApiConfig, chat: &ChatSettings, token: Option<String>) -> Self {
        Self {
            ws_url: api.ws_url.clone(),
            token,
            reconnect: ReconnectPolicy::from_settings(chat),
            heartbeat_interval: Duration::from_secs(chat.heartbeat_secs),
            connect_timeout: Duration::from_secs(api.timeout_secs),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_fixed_five_seconds_forever() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.initial_delay, Duration::from_secs(5));
        assert_eq!(policy.multiplier, 1.0);
        assert!(policy.max_attempts.is_none());

        for attempt in [0, 1, 5, 100, u32::MAX] {
            assert_eq!(policy.delay_for_attempt(attempt), Duration::from_secs(5));
            assert!(policy.should_retry(attempt));
        }
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: None,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(10));
    }

    #[test]
    fn retry_with_max_attempts() {
        let policy = ReconnectPolicy {
            max_attempts: Some(3),
            ..Default::default()
        };

        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn settings_map_onto_runtime_config() {
        let api = ApiConfig::default();
        let chat = ChatSettings {
            reconnect_interval_secs: 2,
            reconnect_max_delay_secs: 1,
            reconnect_multiplier: 0.5,
            ..ChatSettings::default()
        };
        let config = RealtimeConfig::from_settings(&api, &chat, Some("tok".into()));

        assert_eq!(config.ws_url, "ws://localhost:8080/ws");
        assert_eq!(config.token.as_deref(), Some("tok"));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        // Max delay never undercuts the initial delay, multiplier never shrinks it.
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(2));
        assert_eq!(config.reconnect.delay_for_attempt(3), Duration::from_secs(2));
    }
}
