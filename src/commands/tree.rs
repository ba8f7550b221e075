use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::cli::SourceArgs;
use crate::grouping::{DirectoryTree, FileGrouper, GroupBy};
use crate::sources::resolve_inputs;

use super::{inputs_or_cwd, walk_source};

/// Print the directory tree of the files `review` would process
pub async fn run(paths: Vec<PathBuf>, filters: SourceArgs, ascii: bool) -> Result<()> {
    let root = env::current_dir()?;
    let files = resolve_inputs(&inputs_or_cwd(&paths), &walk_source(&filters))?;

    let grouper = FileGrouper::new(GroupBy::Directory).with_base(root);
    let tree = DirectoryTree::build(&files, &grouper);

    for line in tree.render(!ascii) {
        println!("{line}");
    }
    println!("{} files", tree.total_files());
    Ok(())
}
