//! Built-in analyzers used by the command line
//!
//! Plain text statistics. Other analyses plug in through the
//! [`Analyzer`](crate::processing::Analyzer) and
//! [`ChunkAnalyzer`](crate::diff::ChunkAnalyzer) traits.

mod diff_stats;
mod line_stats;

pub use diff_stats::DiffStatsAnalyzer;
pub use line_stats::{FileStats, LineStatsAnalyzer};

/// Markers counted as follow-up notes
pub(crate) const TODO_MARKERS: &[&str] = &["TODO", "FIXME", "XXX", "HACK"];

pub(crate) fn has_todo_marker(line: &str) -> bool {
    TODO_MARKERS.iter().any(|marker| line.contains(marker))
}
