pub mod diff;
pub mod init;
pub mod review;
pub mod tree;

use std::path::PathBuf;

use crate::cli::SourceArgs;
use crate::sources::WalkSource;

/// Inputs to resolve; the current directory when none are given
fn inputs_or_cwd(paths: &[PathBuf]) -> Vec<PathBuf> {
    if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths.to_vec()
    }
}

fn walk_source(filters: &SourceArgs) -> WalkSource {
    WalkSource::default()
        .with_extensions(filters.extensions.clone())
        .with_ignore_patterns(filters.ignore.clone())
}
