use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound of the uniform random delay added to every backoff
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_ms() -> u64 {
    100
}

impl RetryConfig {
    /// A configuration that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.base_delay_ms == 0 {
            return Err(ConfigError::invalid(
                "retry.base_delay_ms",
                "must be greater than 0",
            ));
        }
        if self.max_delay_ms == 0 {
            return Err(ConfigError::invalid(
                "retry.max_delay_ms",
                "must be greater than 0",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 0.0 {
            return Err(ConfigError::invalid(
                "retry.backoff_multiplier",
                format!("must be a positive number, got {}", self.backoff_multiplier),
            ));
        }
        Ok(())
    }

    /// Backoff applied after the given failed attempt (1-indexed), before jitter.
    ///
    /// `min(max_delay, base_delay * multiplier^(attempt - 1))`
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Backoff for the given failed attempt with uniform jitter in `[0, jitter_ms]`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if self.jitter_ms == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        base + Duration::from_millis(jitter)
    }
}
