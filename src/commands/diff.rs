//! Diff command: chunk a (possibly huge) diff and analyze the chunks under a
//! concurrency cap.

use anyhow::{Context, Result};
use console::Style;
use std::collections::BTreeSet;
use std::env;
use std::path::Path;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::analyzers::DiffStatsAnalyzer;
use crate::cli::DiffArgs;
use crate::diff::{merge, ChunkProcessor, DiffChunk, DiffChunker, MergedAnalysis, Severity};
use crate::gate::ConcurrencyGate;
use crate::metrics::gather_metrics;
use crate::progress::TerminalCapabilities;
use crate::retry::RetryPolicy;
use crate::Config;

pub async fn run(args: DiffArgs) -> Result<()> {
    let root = env::current_dir()?;
    let mut config = Config::load(&root)?;
    if let Some(lines) = args.max_lines {
        config.chunking.max_lines_per_chunk = lines;
    }
    if let Some(bytes) = args.max_bytes {
        config.chunking.max_bytes_per_chunk = bytes;
    }
    if let Some(limit) = args.concurrency {
        config.chunking.max_concurrency = limit;
    }
    config.validate().context("Invalid diff options")?;

    let diff = read_input(&args.input).await?;

    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("diff", run_id = %run_id);
    let (chunks, merged) = analyze(&config, &diff).instrument(span).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&merged)?);
    } else {
        print_summary(&chunks, &merged, TerminalCapabilities::detect().supports_color);
    }
    if args.metrics {
        print!("{}", gather_metrics());
    }
    Ok(())
}

async fn analyze(config: &Config, diff: &str) -> Result<(Vec<DiffChunk>, MergedAnalysis)> {
    let started = Instant::now();
    let chunks = DiffChunker::from_config(&config.chunking)?.chunk(diff);

    let processor = ChunkProcessor::new(ConcurrencyGate::new(config.chunking.max_concurrency)?)
        .with_retry(RetryPolicy::new(config.retry.clone())?);
    let results = processor.process(&chunks, &DiffStatsAnalyzer::default()).await;
    let merged = merge(&results);

    info!(
        chunks = merged.chunks_total,
        failed = merged.errors.len(),
        issues = merged.issues.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "diff analyzed"
    );
    Ok((chunks, merged))
}

async fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut diff = String::new();
        tokio::io::stdin()
            .read_to_string(&mut diff)
            .await
            .context("Failed to read diff from stdin")?;
        Ok(diff)
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read diff from {}", input.display()))
    }
}

fn print_summary(chunks: &[DiffChunk], merged: &MergedAnalysis, color: bool) {
    let bold = Style::new().bold().force_styling(color);
    let green = Style::new().green().force_styling(color);
    let red = Style::new().red().force_styling(color);
    let yellow = Style::new().yellow().force_styling(color);

    let files: BTreeSet<_> = chunks.iter().filter_map(|c| c.file.as_ref()).collect();
    let additions: usize = chunks.iter().map(|c| c.additions).sum();
    let deletions: usize = chunks.iter().map(|c| c.deletions).sum();

    println!(
        "{} {} chunks over {} files, {} {}",
        bold.apply_to("Diff:"),
        chunks.len(),
        files.len(),
        green.apply_to(format!("+{additions}")),
        red.apply_to(format!("-{deletions}")),
    );

    for issue in &merged.issues {
        let label = match issue.severity {
            Severity::Error => red.apply_to("error"),
            Severity::Warning => yellow.apply_to("warning"),
            Severity::Info => Style::new().dim().force_styling(color).apply_to("info"),
        };
        let location = match (&issue.file, issue.line) {
            (Some(file), Some(line)) => format!("{}:{}", file.display(), line),
            (None, Some(line)) => format!("line {line}"),
            (Some(file), None) => file.display().to_string(),
            (None, None) => String::new(),
        };
        println!("  {label} {location} {}", issue.message);
    }
    for suggestion in &merged.suggestions {
        println!("  suggestion: {suggestion}");
    }
    for failure in &merged.errors {
        println!(
            "  {} chunk {} (lines {}-{}): {}",
            red.apply_to("failed"),
            failure.index,
            failure.start_line,
            failure.end_line,
            failure.error
        );
    }

    println!(
        "{}/{} chunks analyzed, {} issues",
        merged.chunks_succeeded,
        merged.chunks_total,
        merged.issues.len()
    );
}
