use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reviewpipe::analyzers::DiffStatsAnalyzer;
use reviewpipe::diff::{
    merge, ChangeType, ChunkAnalysis, ChunkAnalyzer, ChunkProcessor, DiffChunk, DiffChunker,
};
use reviewpipe::gate::ConcurrencyGate;
use reviewpipe::retry::RetryPolicy;

use crate::helpers::fast_retry;

const TWO_FILE_DIFF: &str = concat!(
    "diff --git a/src/new.rs b/src/new.rs\n",
    "new file mode 100644\n",
    "--- /dev/null\n",
    "+++ b/src/new.rs\n",
    "@@ -0,0 +1,3 @@\n",
    "+pub fn hello() {\n",
    "+    println!(\"hi\");\n",
    "+}\n",
    "diff --git a/src/old.rs b/src/old.rs\n",
    "deleted file mode 100644\n",
    "--- a/src/old.rs\n",
    "+++ /dev/null\n",
    "@@ -1,2 +0,0 @@\n",
    "-fn gone() {}\n",
    "-fn also_gone() {}\n",
);

fn assert_contiguous(chunks: &[DiffChunk], total_lines: usize) {
    let mut next = 1;
    for chunk in chunks {
        assert_eq!(chunk.start_line, next, "gap before chunk {}", chunk.index);
        assert!(!chunk.content.is_empty());
        next = chunk.end_line + 1;
    }
    assert_eq!(next, total_lines + 1);
}

#[test]
fn test_chunks_cover_large_diff_without_gaps() {
    let lines: usize = 1_000;
    let max_lines = 64;
    let diff = (0..lines)
        .map(|i| format!("+    total += {i};"))
        .collect::<Vec<_>>()
        .join("\n");

    let chunks = DiffChunker::new(max_lines, usize::MAX).unwrap().chunk(&diff);

    assert!(chunks.len() >= lines.div_ceil(max_lines));
    assert!(chunks.iter().all(|c| c.line_count() <= max_lines));
    assert_contiguous(&chunks, lines);
    let additions: usize = chunks.iter().map(|c| c.additions).sum();
    assert_eq!(additions, lines);
}

#[test]
fn test_chunks_respect_byte_cap() {
    let diff = (0..50)
        .map(|i| format!("+{}", "x".repeat(30 + i % 7)))
        .collect::<Vec<_>>()
        .join("\n");

    let chunks = DiffChunker::new(1_000, 200).unwrap().chunk(&diff);

    assert!(chunks.iter().all(|c| c.content.len() + 1 <= 200));
    assert_contiguous(&chunks, 50);
}

#[test]
fn test_file_headers_split_and_label_chunks() {
    let chunks = DiffChunker::new(100, 4096).unwrap().chunk(TWO_FILE_DIFF);

    let new_file: Vec<_> = chunks
        .iter()
        .filter(|c| c.file.as_deref() == Some(std::path::Path::new("src/new.rs")))
        .collect();
    let old_file: Vec<_> = chunks
        .iter()
        .filter(|c| c.file.as_deref() == Some(std::path::Path::new("src/old.rs")))
        .collect();

    assert!(!new_file.is_empty() && !old_file.is_empty());
    assert!(new_file.iter().all(|c| c.change_type == ChangeType::Added));
    assert!(old_file.iter().all(|c| c.change_type == ChangeType::Deleted));
    // No chunk mixes lines of both files
    assert!(chunks.iter().all(|c| c.content.matches("diff --git").count() <= 1));
    assert_contiguous(&chunks, TWO_FILE_DIFF.lines().count());
}

/// Rejects chunk 1 with a non-retryable error, counting every call
struct RejectSecond {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChunkAnalyzer for RejectSecond {
    async fn analyze_chunk(&self, chunk: &DiffChunk) -> anyhow::Result<ChunkAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        if chunk.index == 1 {
            return Err(anyhow!("invalid request: chunk {} rejected", chunk.index));
        }
        Ok(ChunkAnalysis {
            suggestions: vec!["keep functions short".to_string()],
            ..ChunkAnalysis::default()
        })
    }
}

#[tokio::test]
async fn test_failed_chunk_does_not_stop_the_rest() -> Result<()> {
    let diff = (0..12).map(|i| format!("+line {i}")).collect::<Vec<_>>().join("\n");
    let chunks = DiffChunker::new(3, usize::MAX)?.chunk(&diff);
    let processor =
        ChunkProcessor::new(ConcurrencyGate::new(2)?).with_retry(RetryPolicy::new(fast_retry(3))?);

    let calls = Arc::new(AtomicUsize::new(0));
    let results = processor
        .process(&chunks, &RejectSecond { calls: calls.clone() })
        .await;
    let merged = merge(&results);

    assert_eq!(results.len(), 4);
    // Non-retryable message, so the failing chunk ran once
    assert_eq!(results[1].attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(merged.chunks_total, 4);
    assert_eq!(merged.chunks_succeeded, 3);
    assert_eq!(merged.errors.len(), 1);
    assert_eq!(merged.errors[0].index, 1);
    assert_eq!(merged.suggestions, vec!["keep functions short".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_builtin_analyzer_over_whole_diff() -> Result<()> {
    let chunks = DiffChunker::new(100, 4096)?.chunk(TWO_FILE_DIFF);
    let results = ChunkProcessor::new(ConcurrencyGate::new(4)?)
        .process(&chunks, &DiffStatsAnalyzer::default())
        .await;
    let merged = merge(&results);

    assert!(merged.is_complete());
    assert_eq!(merged.metrics.len(), chunks.len());
    let debug_print = merged
        .issues
        .iter()
        .find(|i| i.message.contains("println"))
        .expect("debug output is flagged");
    assert_eq!(debug_print.line, Some(7));
    Ok(())
}
