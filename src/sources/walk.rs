use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use tracing::{debug, warn};

use super::{has_extension, FileSource};

/// Walks directories respecting `.gitignore`, hidden files and ignore patterns
#[derive(Debug, Clone, Default)]
pub struct WalkSource {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl WalkSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Same filters, different roots
    pub fn with_roots(&self, roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..self.clone()
        }
    }

    /// Only keep files with one of these extensions (no dot); empty keeps all
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        self
    }

    /// Skip paths matching these patterns (e.g. `target`, `*.lock`)
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Whether a path found some other way passes the same filters
    pub fn accepts(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        has_extension(path, &self.extensions)
            && !self.ignore_patterns.iter().any(|p| path_str.contains(p.as_str()))
    }

    fn walk_root(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut builder = WalkBuilder::new(root);
        builder
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .hidden(true);

        if !self.ignore_patterns.is_empty() {
            let mut overrides = OverrideBuilder::new(root);
            for pattern in &self.ignore_patterns {
                overrides
                    .add(&format!("!{pattern}"))
                    .and_then(|o| o.add(&format!("!{pattern}/**")))
                    .with_context(|| format!("Invalid ignore pattern: {pattern}"))?;
            }
            builder.overrides(overrides.build().context("Failed to build ignore overrides")?);
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.into_path();
            if self.accepts(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

impl FileSource for WalkSource {
    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for root in &self.roots {
            let found = self.walk_root(root)?;
            debug!(root = %root.display(), files = found.len(), "walked directory");
            files.extend(found);
        }
        files.sort();
        Ok(files)
    }
}
