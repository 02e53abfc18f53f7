//! Notifier configuration.
//!
//! Every field has a default, so an empty RON map yields a working notifier:
//!
//! ```ron
//! webhooks: (
//!     max_attempts: 3,
//!     attempt_timeout_secs: 10,
//!     backoff: Some((base_delay_ms: 100, max_delay_ms: 2000, jitter_factor: 0.2)),
//! )
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for [`crate::DeliveryNotifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Attempts made against one receiver for one notification.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Upper bound for a single HTTP attempt (in seconds).
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// `User-Agent` header sent with every request.
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Delay between attempts to the same receiver.
    ///
    /// `None` retries immediately.
    #[serde(default)]
    pub backoff: Option<BackoffPolicy>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            attempt_timeout_secs: defaults::attempt_timeout_secs(),
            user_agent: defaults::user_agent(),
            backoff: None,
        }
    }
}

impl NotifierConfig {
    /// Check that the configuration describes a bounded, non-empty retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero attempts, a zero timeout, or a
    /// jitter factor outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }

        if self.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "attempt_timeout_secs",
                reason: "timeout must be non-zero".to_string(),
            });
        }

        if let Some(backoff) = &self.backoff
            && !(0.0..=1.0).contains(&backoff.jitter_factor)
        {
            return Err(ConfigError::Invalid {
                field: "backoff.jitter_factor",
                reason: format!("{} is outside 0.0..=1.0", backoff.jitter_factor),
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Worst-case time one receiver can hold the calling thread, ignoring
    /// backoff delays.
    #[must_use]
    pub fn blocking_budget(&self) -> Duration {
        Duration::from_secs(
            self.attempt_timeout_secs
                .saturating_mul(u64::from(self.max_attempts)),
        )
    }
}

/// Exponential backoff with jitter between attempts to one receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry (in milliseconds).
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on any single delay (in milliseconds).
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomisation applied to each delay, e.g. 0.2 for ±20%.
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait before retry number `retry` (1-indexed).
    ///
    /// `delay = min(base * 2^(retry - 1), max) * (1 ± jitter)`
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let delay = if exponent >= 63 {
            self.max_delay_ms
        } else {
            self.base_delay_ms
                .saturating_mul(1u64 << exponent)
                .min(self.max_delay_ms)
        };

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jittered = {
            let jitter_range = (delay as f64) * self.jitter_factor;
            if jitter_range > 0.0 {
                let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
                ((delay as f64) + jitter).max(0.0) as u64
            } else {
                delay
            }
        };

        Duration::from_millis(jittered)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn attempt_timeout_secs() -> u64 {
        10
    }

    pub fn user_agent() -> String {
        "AdCP-Sales-Agent/1.0".to_string()
    }

    pub const fn base_delay_ms() -> u64 {
        200
    }

    pub const fn max_delay_ms() -> u64 {
        2_000
    }

    pub const fn jitter_factor() -> f64 {
        0.2 // ±20%
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_config_defaults() {
        let config = NotifierConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.attempt_timeout_secs, 10);
        assert_eq!(config.user_agent, "AdCP-Sales-Agent/1.0");
        assert!(config.backoff.is_none());
        assert_eq!(config.blocking_budget(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_ron_uses_defaults() {
        let config: NotifierConfig = ron::from_str("()").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.attempt_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_ron_with_backoff() {
        let config: NotifierConfig = ron::from_str(
            "(max_attempts: 5, backoff: Some((base_delay_ms: 50, jitter_factor: 0.0)))",
        )
        .unwrap();
        assert_eq!(config.max_attempts, 5);
        let backoff = config.backoff.unwrap();
        assert_eq!(backoff.base_delay_ms, 50);
        assert_eq!(backoff.max_delay_ms, 2_000);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = NotifierConfig {
            max_attempts: 0,
            ..NotifierConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "max_attempts", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = NotifierConfig {
            attempt_timeout_secs: 0,
            ..NotifierConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_jitter() {
        let config = NotifierConfig {
            backoff: Some(BackoffPolicy {
                jitter_factor: 1.5,
                ..BackoffPolicy::default()
            }),
            ..NotifierConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_exponential_without_jitter() {
        let policy = BackoffPolicy {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter_factor: 0.0,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(100), Duration::from_millis(1_000));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Calls an unsupported method")]
    fn test_backoff_jitter_stays_in_range() {
        let policy = BackoffPolicy {
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter_factor: 0.2,
        };

        for _ in 0..50 {
            let delay = policy.delay_for(1).as_millis();
            assert!((800..=1_200).contains(&delay), "delay {delay} out of range");
        }
    }
}
