use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use super::FileSource;

/// Expands glob patterns (`src/**/*.rs`) into existing files
#[derive(Debug, Clone, Default)]
pub struct GlobSource {
    patterns: Vec<String>,
}

impl GlobSource {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl FileSource for GlobSource {
    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for pattern in &self.patterns {
            let paths =
                glob::glob(pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
            for entry in paths {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(_) => {}
                    Err(e) => warn!("Skipping unreadable path: {}", e),
                }
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}
