use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::metrics::RETRY_ATTEMPTS;

use super::classify::{classify, ErrorClass};
use super::config::RetryConfig;

/// Final failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("failed after {attempts} attempt(s): {last_error:#}")]
    Exhausted {
        attempts: u32,
        last_error: anyhow::Error,
    },

    #[error("non-retryable failure on attempt {attempts}: {last_error:#}")]
    NonRetryable {
        attempts: u32,
        last_error: anyhow::Error,
    },

    #[error("circuit breaker open after {consecutive_failures} consecutive failures")]
    CircuitOpen { consecutive_failures: u32 },
}

impl RetryError {
    /// Number of times the operation was actually invoked
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::NonRetryable { attempts, .. } => *attempts,
            Self::CircuitOpen { .. } => 0,
        }
    }

    /// The error returned by the last invocation, if any
    pub fn last_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Exhausted { last_error, .. } | Self::NonRetryable { last_error, .. } => {
                Some(last_error)
            }
            Self::CircuitOpen { .. } => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(self, Self::NonRetryable { .. })
    }
}

/// A retry that is about to be scheduled
#[derive(Debug)]
pub struct RetryNotice<'a> {
    /// The attempt that just failed (1-indexed)
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub error: &'a anyhow::Error,
}

pub type Classifier = Arc<dyn Fn(&anyhow::Error) -> ErrorClass + Send + Sync>;

/// Batch execution options for [`RetryPolicy::execute_many`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Run every operation at once instead of one after another
    pub parallel: bool,
    /// Stop scheduling sequential operations after the first failure
    pub fail_fast: bool,
}

/// Outcome of a batch, results in input order
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub results: Vec<Result<T, RetryError>>,
    /// Operations never started because of `fail_fast`
    pub skipped: usize,
}

impl<T> BatchOutcome<T> {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }
}

/// Retries transient failures with capped exponential backoff
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: Classifier,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Create a policy, rejecting invalid configuration
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: Arc::new(classify),
        })
    }

    /// Replace the default message/io based classifier
    pub fn with_classifier<C>(mut self, classifier: C) -> Self
    where
        C: Fn(&anyhow::Error) -> ErrorClass + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Same classifier with a different configuration (per-call override)
    pub fn with_config(&self, config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: self.classifier.clone(),
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn classify(&self, error: &anyhow::Error) -> ErrorClass {
        (self.classifier)(error)
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of attempts
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.execute_observed(operation, |_| {}).await
    }

    /// Like [`execute`](Self::execute), reporting every scheduled retry to `on_retry`
    pub async fn execute_observed<T, F, Fut, O>(
        &self,
        mut operation: F,
        mut on_retry: O,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        O: FnMut(RetryNotice<'_>),
    {
        let max_attempts = self.config.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.classify(&error).is_retryable() {
                debug!(attempt, "non-retryable failure: {:#}", error);
                return Err(RetryError::NonRetryable {
                    attempts: attempt,
                    last_error: error,
                });
            }

            if attempt >= max_attempts {
                warn!(attempts = attempt, "giving up: {:#}", error);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.config.delay_for_attempt(attempt);
            debug!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying after failure: {:#}",
                error
            );
            on_retry(RetryNotice {
                attempt,
                max_attempts,
                delay,
                error: &error,
            });
            RETRY_ATTEMPTS.inc();

            tokio::time::sleep(delay).await;
        }
    }

    /// Run a batch of operations, each with this policy.
    ///
    /// Sequential by default; `parallel` polls all of them at once. Results
    /// always come back in input order.
    pub async fn execute_many<T, F, Fut>(
        &self,
        operations: Vec<F>,
        options: BatchOptions,
    ) -> BatchOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if options.parallel {
            let results = join_all(operations.into_iter().map(|op| self.execute(op))).await;
            return BatchOutcome {
                results,
                skipped: 0,
            };
        }

        let total = operations.len();
        let mut results = Vec::with_capacity(total);

        for operation in operations {
            let result = self.execute(operation).await;
            let failed = result.is_err();
            results.push(result);

            if failed && options.fail_fast {
                break;
            }
        }

        let skipped = total - results.len();
        if skipped > 0 {
            debug!(skipped, "fail-fast stopped the batch");
        }

        BatchOutcome { results, skipped }
    }
}
