use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::metrics::CIRCUIT_TRIPS;

use super::policy::RetryError;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Consecutive failed calls that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Allow a single trial call after this cooldown (None = stay open until reset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_after_ms: Option<u64>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            failure_threshold: default_failure_threshold(),
            reset_after_ms: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_failure_threshold() -> u32 {
    5
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    Closed,
    Open,
    /// Cooldown elapsed, one trial call admitted
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    trips: u32,
}

/// Failure-latching wrapper around an operation.
///
/// Once `failure_threshold` consecutive calls fail, every further call fails
/// fast without running the operation until [`reset`](Self::reset) is called
/// (or, when `reset_after` is set, a trial call succeeds).
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_after: Option<Duration>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32) -> Result<Self, ConfigError> {
        if failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "must be at least 1",
            ));
        }

        Ok(Self {
            failure_threshold,
            reset_after: None,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
                trips: 0,
            }),
        })
    }

    /// Build from configuration; `None` when the breaker is disabled
    pub fn from_config(config: &CircuitBreakerConfig) -> Result<Option<Self>, ConfigError> {
        config.validate()?;
        if !config.enabled {
            return Ok(None);
        }

        let mut breaker = Self::new(config.failure_threshold)?;
        breaker.reset_after = config.reset_after_ms.map(Duration::from_millis);
        Ok(Some(breaker))
    }

    /// Enable the timed half-open trial
    pub fn with_reset_after(mut self, cooldown: Duration) -> Self {
        self.reset_after = Some(cooldown);
        self
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// How many times the circuit has opened
    pub fn trips(&self) -> u32 {
        self.inner.lock().trips
    }

    /// Ask permission to run one call
    pub fn try_acquire(&self) -> Result<(), RetryError> {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let cooled_down = match (self.reset_after, inner.opened_at) {
                    (Some(cooldown), Some(opened_at)) => opened_at.elapsed() >= cooldown,
                    _ => false,
                };

                if cooled_down {
                    info!("circuit breaker half-open, admitting a trial call");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(())
                } else {
                    Err(RetryError::CircuitOpen {
                        consecutive_failures: inner.consecutive_failures,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(RetryError::CircuitOpen {
                        consecutive_failures: inner.consecutive_failures,
                    })
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            info!("trial call succeeded, closing circuit breaker");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.trial_in_flight = false;

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };

        if should_open {
            warn!(
                consecutive_failures = inner.consecutive_failures,
                "circuit breaker opened"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trips += 1;
            CIRCUIT_TRIPS.inc();
        }
    }

    /// Close the circuit and forget past failures
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    /// Run `call` unless the circuit is open, recording its outcome.
    ///
    /// A `CircuitOpen` error coming back from `call` itself is passed through
    /// without counting as a failure. So is a non-retryable failure: it is a
    /// property of the input, not of the operation's health.
    pub async fn call<T, F, Fut>(&self, call: F) -> Result<T, RetryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RetryError>>,
    {
        self.try_acquire()?;

        match call().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) if error.is_circuit_open() || error.is_non_retryable() => {
                self.inner.lock().trial_in_flight = false;
                Err(error)
            }
            Err(error) => {
                self.record_failure();
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failure() -> RetryError {
        RetryError::Exhausted {
            attempts: 1,
            last_error: anyhow!("boom"),
        }
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new(2).unwrap();
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let result: Result<(), _> = breaker
                .call(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(failure())
                })
                .await;
            assert!(!result.unwrap_err().is_circuit_open());
        }

        assert!(breaker.is_open());

        let result: Result<(), _> = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.trips(), 1);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_count() {
        let breaker = CircuitBreaker::new(2).unwrap();

        let _: Result<(), _> = breaker.call(|| async { Err(failure()) }).await;
        let _: Result<(), _> = breaker.call(|| async { Ok(()) }).await;
        let _: Result<(), _> = breaker.call(|| async { Err(failure()) }).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_failures_do_not_open_circuit() {
        let breaker = CircuitBreaker::new(2).unwrap();

        for _ in 0..5 {
            let result: Result<(), _> = breaker
                .call(|| async {
                    Err(RetryError::NonRetryable {
                        attempts: 1,
                        last_error: anyhow!("malformed input"),
                    })
                })
                .await;
            assert!(!result.unwrap_err().is_circuit_open());
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_latch_stays_open_until_reset() {
        let breaker = CircuitBreaker::new(1).unwrap();
        let _: Result<(), _> = breaker.call(|| async { Err(failure()) }).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(breaker.try_acquire().is_err());

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_half_open_trial() {
        let breaker = CircuitBreaker::new(1)
            .unwrap()
            .with_reset_after(Duration::from_millis(10));
        let _: Result<(), _> = breaker.call(|| async { Err(failure()) }).await;
        assert!(breaker.try_acquire().is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;

        // Trial fails: back to open
        let _: Result<(), _> = breaker.call(|| async { Err(failure()) }).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.trips(), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;

        // Trial succeeds: closed
        let result: Result<u32, _> = breaker.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_from_config() {
        let disabled = CircuitBreakerConfig {
            enabled: false,
            ..CircuitBreakerConfig::default()
        };
        assert!(CircuitBreaker::from_config(&disabled).unwrap().is_none());

        let enabled = CircuitBreakerConfig::default();
        let breaker = CircuitBreaker::from_config(&enabled).unwrap().unwrap();
        assert_eq!(breaker.failure_threshold(), 5);

        let invalid = CircuitBreakerConfig {
            failure_threshold: 0,
            ..CircuitBreakerConfig::default()
        };
        assert!(CircuitBreaker::from_config(&invalid).is_err());
    }
}
