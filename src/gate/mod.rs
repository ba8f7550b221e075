//! Counting gate bounding how many analysis operations run at once.
//!
//! Thin wrapper over `tokio::sync::Semaphore` shared by file processing and
//! diff chunk processing.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::config::ConfigError;

/// Returned when acquiring from a gate that has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("concurrency gate is closed")]
pub struct GateClosed;

/// Bounded concurrency gate. Cloning shares the same permit pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// Held for the duration of one gated operation; dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `limit` concurrent holders
    pub fn new(limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if limit > Semaphore::MAX_PERMITS {
            return Err(ConfigError::invalid(
                "concurrency",
                format!("must not exceed {}", Semaphore::MAX_PERMITS),
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        trace!(in_flight = self.in_flight(), "gate permit acquired");
        Ok(GatePermit { _permit: permit })
    }

    /// Take a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<GatePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    /// Run `fut` while holding a slot
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, GateClosed>
    where
        F: Future,
    {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }

    /// Stop admitting new holders; pending and future acquires fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.available())
    }
}
