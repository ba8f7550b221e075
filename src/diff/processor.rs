use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::gate::ConcurrencyGate;
use crate::metrics::CHUNKS_PROCESSED;
use crate::retry::RetryPolicy;

use super::chunker::DiffChunk;
use super::merge::ChunkAnalysis;

/// Analysis applied to each diff chunk
#[async_trait]
pub trait ChunkAnalyzer: Send + Sync {
    async fn analyze_chunk(&self, chunk: &DiffChunk) -> anyhow::Result<ChunkAnalysis>;
}

/// Outcome of one chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkResult {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ChunkAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    #[serde(skip)]
    pub duration: Duration,
}

impl ChunkResult {
    pub fn is_success(&self) -> bool {
        self.analysis.is_some()
    }
}

/// Runs chunk analyses through a concurrency gate.
///
/// Every chunk gets a result; a failing chunk never stops the others.
/// Results come back in chunk order regardless of completion order.
#[derive(Debug, Clone)]
pub struct ChunkProcessor {
    gate: ConcurrencyGate,
    policy: Option<RetryPolicy>,
}

impl ChunkProcessor {
    pub fn new(gate: ConcurrencyGate) -> Self {
        Self { gate, policy: None }
    }

    /// Retry failing chunks with `policy`
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub async fn process<A: ChunkAnalyzer + ?Sized>(
        &self,
        chunks: &[DiffChunk],
        analyzer: &A,
    ) -> Vec<ChunkResult> {
        debug!(
            chunks = chunks.len(),
            limit = self.gate.limit(),
            "processing diff chunks"
        );

        let tasks = chunks.iter().map(|chunk| self.process_one(chunk, analyzer));
        let results = join_all(tasks).await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "some diff chunks failed");
        }
        results
    }

    async fn process_one<A: ChunkAnalyzer + ?Sized>(
        &self,
        chunk: &DiffChunk,
        analyzer: &A,
    ) -> ChunkResult {
        let clock = Instant::now();
        let attempts = AtomicU32::new(0);

        let outcome = match self.gate.acquire().await {
            Err(closed) => Err(closed.to_string()),
            Ok(_permit) => match &self.policy {
                Some(policy) => policy
                    .execute(|| {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        analyzer.analyze_chunk(chunk)
                    })
                    .await
                    .map_err(|e| match e.last_error() {
                        Some(last) => format!("{last:#}"),
                        None => e.to_string(),
                    }),
                None => {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    analyzer
                        .analyze_chunk(chunk)
                        .await
                        .map_err(|e| format!("{e:#}"))
                }
            },
        };

        let (analysis, error, label) = match outcome {
            Ok(analysis) => (Some(analysis), None, "success"),
            Err(error) => {
                debug!(
                    chunk = chunk.index,
                    start_line = chunk.start_line,
                    "chunk analysis failed: {}",
                    error
                );
                (None, Some(error), "error")
            }
        };
        CHUNKS_PROCESSED.with_label_values(&[label]).inc();

        ChunkResult {
            index: chunk.index,
            file: chunk.file.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            analysis,
            error,
            attempts: attempts.load(Ordering::SeqCst),
            duration: clock.elapsed(),
        }
    }
}
