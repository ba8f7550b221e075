//! Drives files through the analysis function
//!
//! The orchestrator runs each file through the retry policy (and optional
//! circuit breaker), in input order or through the concurrency gate,
//! optionally group by group, and reports every transition to the progress
//! state, the guarded renderer and any registered observers.

mod analysis;
mod orchestrator;
mod result;

pub use analysis::{AnalysisOutcome, Analyzer, FnAnalyzer};
pub use orchestrator::{GroupReport, ProcessingOrchestrator, RunOptions, RunReport};
pub use result::{FailureKind, GroupSummary, ProcessingResult};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How files within a run (or within a group) are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One file at a time in input order
    #[default]
    Sequential,
    /// Up to the gate limit at once; results still in input order
    Concurrent,
}
