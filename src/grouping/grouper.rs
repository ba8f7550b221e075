use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::GroupingConfig;

use super::{GroupBy, GroupSort, ALL_FILES_KEY, NO_EXTENSION_KEY, ROOT_GROUP_KEY};

/// A named subset of the input files, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileGroup {
    pub key: String,
    pub files: Vec<PathBuf>,
    /// Directory depth of the key (0 for the root and for non-directory keys)
    pub depth: usize,
}

/// Groups that survived filtering, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingResult {
    pub groups: Vec<FileGroup>,
    /// Keys removed by the include/exclude filter, alphabetical
    pub excluded: Vec<String>,
}

impl GroupingResult {
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.key.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&FileGroup> {
        self.groups.iter().find(|g| g.key == key)
    }
}

/// Include/exclude lists matched against group keys.
///
/// A pattern matches a key equal to it or nested under it (`src` matches
/// `src` and `src/util`, not `srcs`). Exclusion wins over inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl GroupFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include: include.iter().map(|p| normalize_pattern(p)).collect(),
            exclude: exclude.iter().map(|p| normalize_pattern(p)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn allows(&self, key: &str) -> bool {
        if self.exclude.iter().any(|p| key_matches(key, p)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| key_matches(key, p))
    }
}

fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern
        .trim()
        .trim_start_matches("./")
        .trim_end_matches('/')
        .replace('\\', "/");
    if trimmed.is_empty() {
        ROOT_GROUP_KEY.to_string()
    } else {
        trimmed
    }
}

fn file_name_only(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn key_matches(key: &str, pattern: &str) -> bool {
    key == pattern
        || key
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Partitions files into groups
#[derive(Debug, Clone, Default)]
pub struct FileGrouper {
    base: Option<PathBuf>,
    by: GroupBy,
    sort: GroupSort,
    filter: GroupFilter,
}

impl FileGrouper {
    pub fn new(by: GroupBy) -> Self {
        Self {
            by,
            ..Self::default()
        }
    }

    pub fn from_config(config: &GroupingConfig) -> Self {
        Self::new(config.by)
            .with_sort(config.sort)
            .with_filter(GroupFilter::new(
                config.include.clone(),
                config.exclude.clone(),
            ))
    }

    /// Directory keys are computed relative to `base`. Files outside the
    /// base (or reached through `..`) are keyed under the root group.
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_sort(mut self, sort: GroupSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_filter(mut self, filter: GroupFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn criterion(&self) -> GroupBy {
        self.by
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Path relative to the base, using `/` separators, without `.` components.
    /// A path that escapes the base collapses to its file name.
    pub fn relative_key_path(&self, file: &Path) -> String {
        let relative = match &self.base {
            Some(base) => match file.strip_prefix(base) {
                Ok(relative) => relative,
                Err(_) => return file_name_only(file),
            },
            None => file,
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::ParentDir => return file_name_only(file),
                _ => {}
            }
        }
        parts.join("/")
    }

    /// Group key of one file under the configured criterion
    pub fn key_for(&self, file: &Path) -> String {
        match self.by {
            GroupBy::None => ALL_FILES_KEY.to_string(),
            GroupBy::Directory => {
                let relative = self.relative_key_path(file);
                match relative.rsplit_once('/') {
                    Some((dir, _)) if !dir.is_empty() => dir.to_string(),
                    _ => ROOT_GROUP_KEY.to_string(),
                }
            }
            GroupBy::FileType => file
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .filter(|ext| !ext.is_empty())
                .unwrap_or_else(|| NO_EXTENSION_KEY.to_string()),
        }
    }

    fn depth_of(&self, key: &str) -> usize {
        if self.by != GroupBy::Directory || key == ROOT_GROUP_KEY {
            return 0;
        }
        key.split('/').count()
    }

    /// Partition `files`, drop filtered groups and order the rest
    pub fn group(&self, files: &[PathBuf]) -> GroupingResult {
        let mut buckets: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for file in files {
            buckets
                .entry(self.key_for(file))
                .or_default()
                .push(file.clone());
        }

        let mut result = GroupingResult::default();
        for (key, files) in buckets {
            if !self.filter.allows(&key) {
                result.excluded.push(key);
                continue;
            }
            result.groups.push(FileGroup {
                depth: self.depth_of(&key),
                key,
                files,
            });
        }

        sort_groups(&mut result.groups, self.sort);

        debug!(
            criterion = ?self.by,
            groups = result.groups.len(),
            excluded = result.excluded.len(),
            "grouped {} files",
            files.len()
        );
        result
    }
}

/// Order groups in place. Every order falls back to the key for ties.
pub fn sort_groups(groups: &mut [FileGroup], sort: GroupSort) {
    match sort {
        GroupSort::Alphabetical => groups.sort_by(|a, b| a.key.cmp(&b.key)),
        GroupSort::FileCount => groups.sort_by(|a, b| {
            b.files
                .len()
                .cmp(&a.files.len())
                .then_with(|| a.key.cmp(&b.key))
        }),
        GroupSort::Depth => {
            groups.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.key.cmp(&b.key)))
        }
    }
}
