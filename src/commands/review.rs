//! Review command: resolve files, run them through the orchestrator and
//! print the report.

use anyhow::{bail, Context, Result};
use console::Style;
use indicatif::HumanDuration;
use std::env;
use std::sync::Arc;

use crate::analyzers::{FileStats, LineStatsAnalyzer};
use crate::cli::ReviewArgs;
use crate::grouping::DirectoryTree;
use crate::metrics::gather_metrics;
use crate::processing::{ExecutionMode, ProcessingOrchestrator, RunOptions, RunReport};
use crate::progress::{
    guarded_renderer, FileStatus, ProcMemoryProbe, RendererOptions, TermSink,
    TerminalCapabilities,
};
use crate::sources::resolve_inputs;
use crate::Config;

use super::{inputs_or_cwd, walk_source};

pub async fn run(args: ReviewArgs) -> Result<()> {
    let root = env::current_dir()?;
    let mut config = Config::load(&root)?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid review options")?;

    let files = resolve_inputs(&inputs_or_cwd(&args.paths), &walk_source(&args.filters))?;
    if files.is_empty() {
        eprintln!("No files matched the given paths");
    }

    let capabilities = TerminalCapabilities::detect();
    let options = RendererOptions::from_config(capabilities, &config.progress)
        .with_memory_probe(Arc::new(ProcMemoryProbe));
    let renderer = guarded_renderer(capabilities, &config.progress, &options, || {
        Box::new(TermSink::stderr())
    });

    let mut orchestrator = ProcessingOrchestrator::from_config(&config, renderer)?;
    let mut run_options = RunOptions::from_config(&config);
    if let Some(grouper) = run_options.grouping.take() {
        run_options = run_options.with_grouping(grouper.with_base(root.clone()));
    }

    let report = orchestrator
        .run(&files, &LineStatsAnalyzer::default(), run_options)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &options.capabilities);
    }

    if args.metrics {
        print!("{}", gather_metrics());
    }

    if report.has_failures() {
        bail!("{} of {} files failed", report.summary.failed, report.summary.total);
    }
    Ok(())
}

/// Command line flags win over the loaded configuration, field by field
fn apply_overrides(config: &mut Config, args: &ReviewArgs) {
    if let Some(by) = args.group_by {
        config.grouping.by = by;
    }
    if let Some(sort) = args.sort {
        config.grouping.sort = sort;
    }
    config.grouping.include.extend(args.include.iter().cloned());
    config.grouping.exclude.extend(args.exclude.iter().cloned());

    if args.sequential {
        config.processing.mode = ExecutionMode::Sequential;
    }
    if let Some(limit) = args.concurrency {
        config.processing.mode = ExecutionMode::Concurrent;
        config.processing.max_concurrency = limit;
    }
    if args.strict {
        config.processing.continue_on_error = false;
    }
    if let Some(ms) = args.timeout {
        config.processing.timeout_ms = Some(ms);
    }
    if let Some(mode) = args.progress {
        config.progress.mode = mode;
    }
}

/// Tree lines drawn with the glyph set the terminal can show
fn tree_lines(tree: Option<&DirectoryTree>, capabilities: &TerminalCapabilities) -> Vec<String> {
    tree.map(|tree| tree.render(capabilities.supports_unicode))
        .unwrap_or_default()
}

fn print_report(report: &RunReport<FileStats>, capabilities: &TerminalCapabilities) {
    let color = capabilities.supports_color;
    let bold = Style::new().bold().force_styling(color);
    let red = Style::new().red().force_styling(color);
    let yellow = Style::new().yellow().force_styling(color);

    let tree = tree_lines(report.tree.as_ref(), capabilities);
    if !tree.is_empty() {
        for line in tree {
            println!("{line}");
        }
        println!();
    }

    for group in &report.groups {
        println!(
            "{} {}",
            bold.apply_to(&group.key),
            group.summary.describe()
        );
    }
    if !report.excluded.is_empty() {
        println!("Excluded groups: {}", report.excluded.join(", "));
    }

    let (mut lines, mut comments) = (0, 0);
    for result in &report.results {
        if let Some(stats) = &result.analysis {
            lines += stats.lines;
            comments += stats.comment_lines;
        }
        match result.status {
            FileStatus::Warning => println!(
                "{} {}: {}",
                yellow.apply_to("warning"),
                result.file.display(),
                result.warning.as_deref().unwrap_or_default()
            ),
            FileStatus::Error => println!(
                "{} {} after {} attempt(s): {}",
                red.apply_to("error"),
                result.file.display(),
                result.attempts,
                result.error.as_deref().unwrap_or_default()
            ),
            _ => {}
        }
    }

    println!();
    println!("{}", bold.apply_to(report.summary.describe()));
    println!(
        "  {} lines, {} comment lines, {} total analysis time",
        lines,
        comments,
        HumanDuration(report.summary.total_duration)
    );
    if report.aborted {
        println!("{}", red.apply_to("  stopped early after a failure (--strict)"));
    }
    if report.render_errors > 0 {
        println!("  progress display fell back after {} render errors", report.render_errors);
    }
}
