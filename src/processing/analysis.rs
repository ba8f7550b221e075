use std::future::Future;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Value produced by one successful analysis, with an optional non-fatal issue.
///
/// A present `warning` turns the file's terminal status into `Warning`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> AnalysisOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn with_warning(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            warning: Some(warning.into()),
        }
    }
}

impl<T> From<T> for AnalysisOutcome<T> {
    fn from(value: T) -> Self {
        Self::ok(value)
    }
}

/// Per-file analysis supplied by the caller.
///
/// Must be safe to call concurrently up to the orchestrator's concurrency
/// limit. Failures are plain `anyhow` errors; wrap them in
/// [`FailureHint`](crate::retry::FailureHint) to force a retry decision.
#[async_trait]
pub trait Analyzer: Send + Sync {
    type Output: Send + 'static;

    async fn analyze(&self, file: &Path) -> anyhow::Result<AnalysisOutcome<Self::Output>>;
}

/// Adapts an async closure taking the file path
pub struct FnAnalyzer<F, T> {
    f: F,
    _output: PhantomData<fn() -> T>,
}

impl<F, Fut, T> FnAnalyzer<F, T>
where
    F: Fn(PathBuf) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<AnalysisOutcome<T>>> + Send,
    T: Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T> Analyzer for FnAnalyzer<F, T>
where
    F: Fn(PathBuf) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<AnalysisOutcome<T>>> + Send,
    T: Send + 'static,
{
    type Output = T;

    async fn analyze(&self, file: &Path) -> anyhow::Result<AnalysisOutcome<T>> {
        (self.f)(file.to_path_buf()).await
    }
}
