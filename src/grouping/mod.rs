//! File grouping
//!
//! Partitions a file list by directory or by extension, filters and orders
//! the groups, and builds a directory tree for display.

mod grouper;
mod tree;

pub use grouper::{FileGroup, FileGrouper, GroupFilter, GroupingResult};
pub use tree::{DirectoryTree, TreeNode};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Key of the group holding files directly under the base directory
pub const ROOT_GROUP_KEY: &str = ".";

/// Key of the group holding files without an extension
pub const NO_EXTENSION_KEY: &str = "no-extension";

/// Key of the single group produced when grouping is off
pub const ALL_FILES_KEY: &str = "all";

/// Grouping criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    None,
    Directory,
    #[value(name = "filetype")]
    FileType,
}

/// Order in which groups are processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GroupSort {
    /// Lexicographic on the group key
    #[default]
    Alphabetical,
    /// Largest group first, ties alphabetical
    FileCount,
    /// Shallowest directory first, ties alphabetical
    Depth,
}
