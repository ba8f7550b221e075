//! Per-file results and the summaries derived from them

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::progress::FileStatus;
use crate::retry::RetryError;

/// Why a file ended in `Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every attempt failed with a retryable error
    Exhausted,
    /// A non-retryable error stopped the retries
    NonRetryable,
    /// The circuit breaker rejected the call without running it
    CircuitOpen,
    /// The concurrency gate was closed before the file could start
    GateClosed,
}

impl From<&RetryError> for FailureKind {
    fn from(error: &RetryError) -> Self {
        match error {
            RetryError::Exhausted { .. } => Self::Exhausted,
            RetryError::NonRetryable { .. } => Self::NonRetryable,
            RetryError::CircuitOpen { .. } => Self::CircuitOpen,
        }
    }
}

/// Outcome of one file in one run. Built once, never modified.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult<T> {
    pub file: PathBuf,
    /// True when the analysis produced a value (`Success` or `Warning`)
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub status: FileStatus,
    /// Times the analysis was invoked, 0 when it never ran
    pub attempts: u32,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<T> ProcessingResult<T> {
    pub fn succeeded(
        file: PathBuf,
        analysis: T,
        warning: Option<String>,
        attempts: u32,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let status = if warning.is_some() {
            FileStatus::Warning
        } else {
            FileStatus::Success
        };
        Self {
            file,
            success: true,
            analysis: Some(analysis),
            error: None,
            failure: None,
            warning,
            status,
            attempts,
            duration,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(
        file: PathBuf,
        error: String,
        failure: FailureKind,
        attempts: u32,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            file,
            success: false,
            analysis: None,
            error: Some(error),
            failure: Some(failure),
            warning: None,
            status: FileStatus::Error,
            attempts,
            duration,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Aggregate counts over a set of results.
///
/// Rates are fractions of `total` and are disjoint: a `Warning` counts
/// towards `warning_rate` only, never towards `success_rate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupSummary {
    pub total: usize,
    pub succeeded: usize,
    pub warnings: usize,
    pub failed: usize,
    #[serde(rename = "total_duration_ms", serialize_with = "serialize_millis")]
    pub total_duration: Duration,
    #[serde(rename = "average_duration_ms", serialize_with = "serialize_millis")]
    pub average_duration: Duration,
    pub success_rate: f64,
    pub warning_rate: f64,
    pub error_rate: f64,
}

impl GroupSummary {
    /// Derive a summary from any set of results (a slice, a group, a filter)
    pub fn from_results<'a, T, I>(results: I) -> Self
    where
        T: 'a,
        I: IntoIterator<Item = &'a ProcessingResult<T>>,
    {
        let mut summary = Self::default();
        for result in results {
            summary.total += 1;
            summary.total_duration += result.duration;
            match result.status {
                FileStatus::Success => summary.succeeded += 1,
                FileStatus::Warning => summary.warnings += 1,
                FileStatus::Error => summary.failed += 1,
                FileStatus::Pending | FileStatus::Processing => {}
            }
        }

        if summary.total > 0 {
            let total = summary.total as f64;
            summary.average_duration = summary.total_duration / summary.total as u32;
            summary.success_rate = summary.succeeded as f64 / total;
            summary.warning_rate = summary.warnings as f64 / total;
            summary.error_rate = summary.failed as f64 / total;
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// One-line human summary
    pub fn describe(&self) -> String {
        if self.failed == 0 && self.warnings == 0 {
            format!("Successfully processed {} files", self.total)
        } else {
            format!(
                "Processed {} files: {} ok, {} with warnings, {} failed",
                self.total, self.succeeded, self.warnings, self.failed
            )
        }
    }
}
