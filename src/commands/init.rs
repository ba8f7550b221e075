use anyhow::{bail, Result};
use std::env;
use tracing::info;

use crate::Config;

/// Write the default configuration into `.reviewpipe/config.toml`
pub async fn run(force: bool) -> Result<()> {
    let root = env::current_dir()?;

    if Config::is_initialized(&root) && !force {
        bail!(
            "reviewpipe is already initialized in {:?} (use --force to overwrite)",
            Config::config_dir(&root)
        );
    }

    Config::default().save(&root)?;

    info!("Initialized reviewpipe in {:?}", Config::config_dir(&root));
    println!(
        "✓ Created {} with default configuration",
        Config::config_dir(&root).display()
    );
    println!("\nNext steps:");
    println!("  1. Edit .reviewpipe/config.toml to tune retries, concurrency and progress");
    println!("  2. Run 'reviewpipe review <paths>' to analyze files");
    println!("  3. Run 'reviewpipe diff <file>' to analyze a diff in chunks");

    Ok(())
}
