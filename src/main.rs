use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use reviewpipe::cli::{Cli, Commands};
use reviewpipe::config::Config;
use reviewpipe::logging::{init_early_logging, init_logging};
use reviewpipe::metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let config = match Config::load(&project_root) {
        Ok(config) => config,
        Err(e) => {
            init_early_logging();
            tracing::error!("{:#}", e);
            return Err(e);
        }
    };

    // Held until exit so buffered log lines are flushed
    let _logging_guard = init_logging(&config.logging, &project_root)?;
    tracing::debug!("Loaded configuration from: {}", project_root.display());

    metrics::register_metrics();

    match cli.command {
        Commands::Init { force } => reviewpipe::commands::init::run(force).await?,
        Commands::Review(args) => reviewpipe::commands::review::run(args).await?,
        Commands::Diff(args) => reviewpipe::commands::diff::run(args).await?,
        Commands::Tree {
            paths,
            filters,
            ascii,
        } => reviewpipe::commands::tree::run(paths, filters, ascii).await?,
    }

    Ok(())
}
