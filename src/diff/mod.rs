//! Chunked processing of large diffs
//!
//! A diff is split into bounded chunks at structural boundaries, the chunks
//! are analysed through the concurrency gate, and the partial analyses are
//! merged back into one.

mod chunker;
mod merge;
mod processor;

pub use chunker::{ChangeType, DiffChunk, DiffChunker};
pub use merge::{merge, ChunkAnalysis, ChunkFailure, Issue, MergedAnalysis, Severity};
pub use processor::{ChunkAnalyzer, ChunkProcessor, ChunkResult};
