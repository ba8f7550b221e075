use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ChunkingConfig, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// A contiguous span of diff lines analysed on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffChunk {
    /// Position in the chunk list (0-based)
    pub index: usize,
    /// File the lines belong to, when the diff carries git headers
    pub file: Option<PathBuf>,
    /// First line of the span in the input diff (1-indexed)
    pub start_line: usize,
    /// Last line of the span (1-indexed, inclusive)
    pub end_line: usize,
    pub content: String,
    pub change_type: ChangeType,
    pub additions: usize,
    pub deletions: usize,
    /// Up to `context_lines` lines before the span
    pub context_before: String,
    /// Up to `context_lines` lines after the span
    pub context_after: String,
}

impl DiffChunk {
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    /// Context and content in diff order, for analysers that want one text
    pub fn with_context(&self) -> String {
        [
            self.context_before.as_str(),
            self.content.as_str(),
            self.context_after.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// File-level facts taken from git headers
#[derive(Debug, Clone, Default)]
struct FileHeader {
    path: Option<PathBuf>,
    change: Option<ChangeType>,
}

impl FileHeader {
    fn from_diff_git(line: &str) -> Self {
        // diff --git a/<old> b/<new>
        let path = line
            .rsplit_once(" b/")
            .map(|(_, new)| PathBuf::from(new.trim()));
        Self { path, change: None }
    }

    fn observe(&mut self, line: &str) {
        if line.starts_with("new file mode") {
            self.change = Some(ChangeType::Added);
        } else if line.starts_with("deleted file mode") {
            self.change = Some(ChangeType::Deleted);
        } else if let Some(path) = line.strip_prefix("+++ ") {
            if path != "/dev/null" {
                let clean = path.strip_prefix("b/").unwrap_or(path);
                self.path = Some(PathBuf::from(clean.trim()));
            }
        } else if let Some(path) = line.strip_prefix("--- ") {
            if self.path.is_none() && path != "/dev/null" {
                let clean = path.strip_prefix("a/").unwrap_or(path);
                self.path = Some(PathBuf::from(clean.trim()));
            }
        }
    }
}

/// Splits a diff into bounded chunks.
///
/// A chunk ends when it reaches the line cap, when the next line would push
/// it past the byte cap, at every file header (`diff --git`) and hunk header
/// (`@@`), and at a code boundary (declaration, comment block, closing
/// brace) once the chunk is within 20% of the line cap. A single line longer
/// than the byte cap becomes a chunk of its own.
#[derive(Debug, Clone)]
pub struct DiffChunker {
    max_lines: usize,
    max_bytes: usize,
    context_lines: usize,
}

impl DiffChunker {
    pub fn new(max_lines: usize, max_bytes: usize) -> Result<Self, ConfigError> {
        if max_lines == 0 {
            return Err(ConfigError::invalid(
                "chunking.max_lines_per_chunk",
                "must be at least 1",
            ));
        }
        if max_bytes == 0 {
            return Err(ConfigError::invalid(
                "chunking.max_bytes_per_chunk",
                "must be at least 1",
            ));
        }
        Ok(Self {
            max_lines,
            max_bytes,
            context_lines: 0,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.max_lines_per_chunk, config.max_bytes_per_chunk)?
            .with_context_lines(config.context_lines))
    }

    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn chunk(&self, diff: &str) -> Vec<DiffChunk> {
        let lines: Vec<&str> = diff.lines().collect();
        let mut chunks = Vec::new();
        let mut header = FileHeader::default();

        let mut start = 0;
        let mut bytes = 0;
        let soft_threshold = (self.max_lines - self.max_lines / 5).max(1);

        for (i, line) in lines.iter().enumerate() {
            let len = i - start;
            let file_header = line.starts_with("diff --git ");

            if len > 0 {
                let hard = file_header || line.starts_with("@@");
                let full = len >= self.max_lines || bytes + line.len() + 1 > self.max_bytes;
                let soft = len >= soft_threshold
                    && (starts_block(line) || ends_block(lines[i - 1]));

                if hard || full || soft {
                    chunks.push(self.build(&lines, start, i - 1, &header, chunks.len()));
                    start = i;
                    bytes = 0;
                }
            }

            if file_header {
                header = FileHeader::from_diff_git(line);
            } else {
                header.observe(line);
            }
            bytes += line.len() + 1;
        }

        if start < lines.len() {
            chunks.push(self.build(&lines, start, lines.len() - 1, &header, chunks.len()));
        }

        debug!(
            lines = lines.len(),
            chunks = chunks.len(),
            "chunked diff"
        );
        chunks
    }

    fn build(
        &self,
        lines: &[&str],
        start: usize,
        end: usize,
        header: &FileHeader,
        index: usize,
    ) -> DiffChunk {
        let span = &lines[start..=end];
        let additions = span
            .iter()
            .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
            .count();
        let deletions = span
            .iter()
            .filter(|l| l.starts_with('-') && !l.starts_with("---"))
            .count();

        let change_type = header.change.unwrap_or(match (additions, deletions) {
            (a, 0) if a > 0 => ChangeType::Added,
            (0, d) if d > 0 => ChangeType::Deleted,
            _ => ChangeType::Modified,
        });

        let before_start = start.saturating_sub(self.context_lines);
        let after_end = (end + 1 + self.context_lines).min(lines.len());

        DiffChunk {
            index,
            file: header.path.clone(),
            start_line: start + 1,
            end_line: end + 1,
            content: span.join("\n"),
            change_type,
            additions,
            deletions,
            context_before: lines[before_start..start].join("\n"),
            context_after: lines[end + 1..after_end].join("\n"),
        }
    }
}

/// Diff content without its `+`/`-`/` ` marker
fn code_of(line: &str) -> &str {
    match line.as_bytes().first() {
        Some(b'+' | b'-' | b' ') => &line[1..],
        _ => line,
    }
}

const DECLARATION_PREFIXES: &[&str] = &[
    "fn ",
    "pub fn ",
    "async fn ",
    "pub async fn ",
    "pub(crate) fn ",
    "impl ",
    "impl<",
    "struct ",
    "pub struct ",
    "enum ",
    "pub enum ",
    "trait ",
    "pub trait ",
    "mod ",
    "pub mod ",
    "def ",
    "async def ",
    "class ",
    "interface ",
    "function ",
    "async function ",
    "export ",
    "func ",
    "type ",
];

/// Line opens a declaration or a comment block
fn starts_block(line: &str) -> bool {
    let code = code_of(line).trim_start();
    code.starts_with("/*")
        || code.starts_with("///")
        || code.starts_with("\"\"\"")
        || DECLARATION_PREFIXES.iter().any(|p| code.starts_with(p))
}

/// Line only closes a block
fn ends_block(line: &str) -> bool {
    matches!(code_of(line).trim(), "}" | "};" | "})" | "end")
}
