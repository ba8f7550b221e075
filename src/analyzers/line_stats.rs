use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use crate::processing::{AnalysisOutcome, Analyzer};

use super::has_todo_marker;

const COMMENT_PREFIXES: &[&str] = &["//", "#", "/*", "*", "--", ";"];

/// Per-file text statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub bytes: usize,
    pub lines: usize,
    pub blank_lines: usize,
    pub comment_lines: usize,
    pub todo_markers: usize,
    pub longest_line: usize,
    pub long_lines: usize,
}

impl FileStats {
    pub fn from_content(content: &str, max_line_length: usize) -> Self {
        let mut stats = Self {
            bytes: content.len(),
            ..Self::default()
        };

        for line in content.lines() {
            stats.lines += 1;
            let trimmed = line.trim();
            let width = line.chars().count();

            if trimmed.is_empty() {
                stats.blank_lines += 1;
            } else if COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
                stats.comment_lines += 1;
            }
            if has_todo_marker(line) {
                stats.todo_markers += 1;
            }
            if width > max_line_length {
                stats.long_lines += 1;
            }
            stats.longest_line = stats.longest_line.max(width);
        }
        stats
    }
}

/// Reads each file and reports line statistics.
///
/// Files with follow-up markers or overlong lines finish with a warning.
#[derive(Debug, Clone)]
pub struct LineStatsAnalyzer {
    max_line_length: usize,
}

impl Default for LineStatsAnalyzer {
    fn default() -> Self {
        Self {
            max_line_length: 120,
        }
    }
}

impl LineStatsAnalyzer {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }
}

#[async_trait]
impl Analyzer for LineStatsAnalyzer {
    type Output = FileStats;

    async fn analyze(&self, file: &Path) -> anyhow::Result<AnalysisOutcome<FileStats>> {
        let content = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let stats = FileStats::from_content(&content, self.max_line_length);

        let mut notes = Vec::new();
        if stats.todo_markers > 0 {
            notes.push(format!("{} follow-up marker(s)", stats.todo_markers));
        }
        if stats.long_lines > 0 {
            notes.push(format!(
                "{} line(s) longer than {} characters",
                stats.long_lines, self.max_line_length
            ));
        }

        Ok(if notes.is_empty() {
            AnalysisOutcome::ok(stats)
        } else {
            AnalysisOutcome::with_warning(stats, notes.join(", "))
        })
    }
}
