use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::processor::ChunkResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Line in the input diff (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: Option<PathBuf>, line: usize) -> Self {
        self.file = file;
        self.line = Some(line);
        self
    }
}

/// Analysis of one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    pub issues: Vec<Issue>,
    pub suggestions: Vec<String>,
    pub metrics: Map<String, Value>,
}

/// A chunk whose analysis failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub error: String,
}

/// Combined analysis of every chunk of a diff
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedAnalysis {
    pub issues: Vec<Issue>,
    pub suggestions: Vec<String>,
    pub metrics: Map<String, Value>,
    pub errors: Vec<ChunkFailure>,
    pub chunks_total: usize,
    pub chunks_succeeded: usize,
}

impl MergedAnalysis {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Merge chunk results in chunk order.
///
/// Issues and suggestions are concatenated without duplicates (first
/// occurrence wins). Metric maps are merged shallowly, a later chunk
/// overwriting keys of an earlier one. Failed chunks only add to `errors`.
pub fn merge(results: &[ChunkResult]) -> MergedAnalysis {
    let mut ordered: Vec<&ChunkResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.index);

    let mut merged = MergedAnalysis {
        chunks_total: results.len(),
        ..MergedAnalysis::default()
    };
    let mut seen_issues = HashSet::new();
    let mut seen_suggestions = HashSet::new();

    for result in ordered {
        match (&result.analysis, &result.error) {
            (Some(analysis), _) => {
                merged.chunks_succeeded += 1;
                for issue in &analysis.issues {
                    if seen_issues.insert(issue.clone()) {
                        merged.issues.push(issue.clone());
                    }
                }
                for suggestion in &analysis.suggestions {
                    if seen_suggestions.insert(suggestion.clone()) {
                        merged.suggestions.push(suggestion.clone());
                    }
                }
                for (key, value) in &analysis.metrics {
                    merged.metrics.insert(key.clone(), value.clone());
                }
            }
            (None, error) => merged.errors.push(ChunkFailure {
                index: result.index,
                start_line: result.start_line,
                end_line: result.end_line,
                error: error
                    .clone()
                    .unwrap_or_else(|| "chunk produced no analysis".to_string()),
            }),
        }
    }

    merged
}
