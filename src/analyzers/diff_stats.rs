use async_trait::async_trait;
use serde_json::{json, Map};

use crate::diff::{ChunkAnalysis, ChunkAnalyzer, DiffChunk, Issue, Severity};

use super::has_todo_marker;

const DEBUG_OUTPUT: &[&str] = &["dbg!(", "println!(", "console.log(", "print(", "fmt.Println("];

/// Line-level checks over the added side of each chunk
#[derive(Debug, Clone)]
pub struct DiffStatsAnalyzer {
    max_line_length: usize,
}

impl Default for DiffStatsAnalyzer {
    fn default() -> Self {
        Self {
            max_line_length: 120,
        }
    }
}

impl DiffStatsAnalyzer {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    fn check_added_line(&self, chunk: &DiffChunk, line_no: usize, text: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut push = |severity, message: String| {
            issues.push(Issue::new(severity, message).at(chunk.file.clone(), line_no));
        };

        if text.ends_with(' ') || text.ends_with('\t') {
            push(Severity::Info, "trailing whitespace".to_string());
        }
        if has_todo_marker(text) {
            push(Severity::Info, "new follow-up marker".to_string());
        }
        if let Some(call) = DEBUG_OUTPUT.iter().find(|call| text.contains(*call)) {
            push(
                Severity::Warning,
                format!("debug output `{}` added", call.trim_end_matches('(')),
            );
        }
        let width = text.chars().count();
        if width > self.max_line_length {
            push(
                Severity::Warning,
                format!("line is {} characters (limit {})", width, self.max_line_length),
            );
        }
        issues
    }
}

#[async_trait]
impl ChunkAnalyzer for DiffStatsAnalyzer {
    async fn analyze_chunk(&self, chunk: &DiffChunk) -> anyhow::Result<ChunkAnalysis> {
        let mut issues = Vec::new();

        for (offset, line) in chunk.content.lines().enumerate() {
            if line.starts_with("+++") {
                continue;
            }
            if let Some(added) = line.strip_prefix('+') {
                issues.extend(self.check_added_line(chunk, chunk.start_line + offset, added));
            }
        }

        let mut suggestions = Vec::new();
        if chunk.additions > 0 && chunk.deletions == 0 && chunk.additions >= self.max_line_length {
            suggestions.push("large pure addition; consider splitting the change".to_string());
        }

        // keyed by span so chunks of the same file never overwrite each other
        let label = chunk
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "diff".to_string());
        let mut metrics = Map::new();
        metrics.insert(
            format!("{}:{}-{}", label, chunk.start_line, chunk.end_line),
            json!({
                "additions": chunk.additions,
                "deletions": chunk.deletions,
                "issues": issues.len(),
            }),
        );

        Ok(ChunkAnalysis {
            issues,
            suggestions,
            metrics,
        })
    }
}
