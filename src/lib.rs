pub mod analyzers;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diff;
pub mod gate;
pub mod grouping;
pub mod logging;
pub mod metrics;
pub mod processing;
pub mod progress;
pub mod retry;
pub mod sources;

pub use config::Config;
pub use processing::{Analyzer, ProcessingOrchestrator, RunOptions, RunReport};
