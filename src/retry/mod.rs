//! Retry policy, failure classification and circuit breaking

pub mod circuit;
pub mod classify;
pub mod config;
pub mod policy;

use std::future::Future;
use std::sync::Arc;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use classify::{classify, classify_message, AttemptTimedOut, ErrorClass, FailureHint};
pub use config::RetryConfig;
pub use policy::{BatchOptions, BatchOutcome, RetryError, RetryNotice, RetryPolicy};

/// Retry policy optionally wrapped in a shared circuit breaker.
///
/// The breaker sees one call per `execute`, i.e. a whole retry sequence.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    policy: RetryPolicy,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl ResilientExecutor {
    pub fn new(policy: RetryPolicy, breaker: Option<Arc<CircuitBreaker>>) -> Self {
        Self { policy, breaker }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.execute_observed(operation, |_| {}).await
    }

    pub async fn execute_observed<T, F, Fut, O>(
        &self,
        operation: F,
        on_retry: O,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        O: FnMut(RetryNotice<'_>),
    {
        match &self.breaker {
            Some(breaker) => {
                breaker
                    .call(|| self.policy.execute_observed(operation, on_retry))
                    .await
            }
            None => self.policy.execute_observed(operation, on_retry).await,
        }
    }
}
