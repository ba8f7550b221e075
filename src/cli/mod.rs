use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::grouping::{GroupBy, GroupSort};
use crate::progress::ProgressMode;

#[derive(Parser)]
#[command(name = "reviewpipe")]
#[command(author, version, about = "Batch file review with retries, grouping and live progress")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default .reviewpipe/config.toml in the current directory
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Analyze files and report per-file results
    Review(ReviewArgs),

    /// Split a diff into chunks and analyze them concurrently
    Diff(DiffArgs),

    /// Print the directory tree of the selected files
    Tree {
        /// Directories, files or glob patterns (default: current directory)
        paths: Vec<PathBuf>,

        #[command(flatten)]
        filters: SourceArgs,

        /// ASCII connectors instead of box-drawing characters
        #[arg(long)]
        ascii: bool,
    },
}

/// File selection shared by `review` and `tree`
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Only keep files with these extensions (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Skip paths containing these patterns (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    /// Directories, files or glob patterns (default: current directory)
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub filters: SourceArgs,

    /// Group files before processing
    #[arg(long, value_enum)]
    pub group_by: Option<GroupBy>,

    /// Group processing order
    #[arg(long, value_enum)]
    pub sort: Option<GroupSort>,

    /// Only process groups matching these keys (repeatable)
    #[arg(long, value_name = "GROUP")]
    pub include: Vec<String>,

    /// Skip groups matching these keys (repeatable)
    #[arg(long, value_name = "GROUP")]
    pub exclude: Vec<String>,

    /// Process one file at a time
    #[arg(long, conflicts_with = "concurrency")]
    pub sequential: bool,

    /// Process up to N files at once
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Stop scheduling files after the first failure
    #[arg(long)]
    pub strict: bool,

    /// Per-attempt timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Progress display
    #[arg(long, value_enum)]
    pub progress: Option<ProgressMode>,

    /// Print the full report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    /// Diff file, or `-` for stdin
    pub input: PathBuf,

    /// Line cap per chunk
    #[arg(long, value_name = "LINES")]
    pub max_lines: Option<usize>,

    /// Byte cap per chunk
    #[arg(long, value_name = "BYTES")]
    pub max_bytes: Option<usize>,

    /// Chunks analyzed at once
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Print the merged analysis as JSON
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,
}
