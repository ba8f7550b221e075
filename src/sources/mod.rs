//! Where the file list comes from
//!
//! Directories are walked respecting `.gitignore`; anything else given on
//! the command line is either a file or a glob pattern.

mod glob_source;
mod walk;

pub use glob_source::GlobSource;
pub use walk::WalkSource;

use std::path::{Path, PathBuf};

use anyhow::Result;

/// Produces the paths to process
pub trait FileSource {
    fn files(&self) -> Result<Vec<PathBuf>>;
}

/// Resolve command line inputs into a sorted, de-duplicated file list.
///
/// Directories are walked, existing files are taken as they are, anything
/// else is expanded as a glob pattern.
pub fn resolve_inputs(inputs: &[PathBuf], walk: &WalkSource) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            files.extend(walk.with_roots(vec![input.clone()]).files()?);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            let pattern = input.to_string_lossy().into_owned();
            let matched = GlobSource::new(vec![pattern]).files()?;
            files.extend(matched.into_iter().filter(|p| walk.accepts(p)));
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
