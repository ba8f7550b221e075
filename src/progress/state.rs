//! Per-file status tracking and aggregate progress counters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Lifecycle of one file: Pending → Processing → Success | Warning | Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Success,
    Warning,
    Error,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Warning | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message attached to a file (error or warning)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMessage {
    pub file: PathBuf,
    pub message: String,
}

/// Remaining time estimate: `(elapsed / completed) * (total - completed)`.
///
/// `None` until at least one file has completed.
pub fn estimate_remaining(elapsed: Duration, completed: usize, total: usize) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(completed) as f64;
    let per_file = elapsed.as_secs_f64() / completed as f64;
    Some(Duration::from_secs_f64(per_file * remaining))
}

/// Files completed per second, `None` before anything completed
pub fn throughput(elapsed: Duration, completed: usize) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if completed == 0 || secs <= 0.0 {
        return None;
    }
    Some(completed as f64 / secs)
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total_files: usize,
    pub completed_files: usize,
    pub current_file: Option<PathBuf>,
    pub succeeded: usize,
    pub warnings: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total_files == 0 {
            return 100.0;
        }
        self.completed_files as f64 * 100.0 / self.total_files as f64
    }
}

/// Progress of one run. Reset at the start of every run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    total_files: usize,
    completed_files: usize,
    current_file: Option<PathBuf>,
    statuses: HashMap<PathBuf, FileStatus>,
    start_time: Instant,
    errors: Vec<FileMessage>,
    warnings: Vec<FileMessage>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            total_files: 0,
            completed_files: 0,
            current_file: None,
            statuses: HashMap::new(),
            start_time: Instant::now(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Forget everything and register `files` as pending
    pub fn reset(&mut self, files: &[PathBuf]) {
        self.statuses = files
            .iter()
            .map(|file| (file.clone(), FileStatus::Pending))
            .collect();
        self.total_files = files.len();
        self.completed_files = 0;
        self.current_file = None;
        self.start_time = Instant::now();
        self.errors.clear();
        self.warnings.clear();
    }

    /// Apply a status transition.
    ///
    /// Returns `true` only when this call moved the file into a terminal
    /// status, which is the only time `completed_files` grows. Terminal
    /// statuses are final; later updates for the same file are ignored.
    pub fn update_status(&mut self, file: &Path, status: FileStatus) -> bool {
        let previous = match self.statuses.get(file) {
            Some(previous) => *previous,
            None => {
                // Files outside the registered set still count towards the total
                self.total_files += 1;
                FileStatus::Pending
            }
        };

        if previous.is_terminal() {
            trace!(
                file = %file.display(),
                %previous,
                requested = %status,
                "ignoring update for finished file"
            );
            return false;
        }

        if status == FileStatus::Pending && previous == FileStatus::Processing {
            return false;
        }

        self.statuses.insert(file.to_path_buf(), status);

        if status == FileStatus::Processing {
            self.current_file = Some(file.to_path_buf());
        }

        if status.is_terminal() {
            self.completed_files += 1;
            return true;
        }

        false
    }

    pub fn record_error(&mut self, file: &Path, message: impl Into<String>) {
        self.errors.push(FileMessage {
            file: file.to_path_buf(),
            message: message.into(),
        });
    }

    pub fn record_warning(&mut self, file: &Path, message: impl Into<String>) {
        self.warnings.push(FileMessage {
            file: file.to_path_buf(),
            message: message.into(),
        });
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn completed_files(&self) -> usize {
        self.completed_files
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn status(&self, file: &Path) -> Option<FileStatus> {
        self.statuses.get(file).copied()
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    pub fn errors(&self) -> &[FileMessage] {
        &self.errors
    }

    pub fn warnings(&self) -> &[FileMessage] {
        &self.warnings
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_files >= self.total_files
    }

    pub fn eta(&self) -> Option<Duration> {
        estimate_remaining(self.elapsed(), self.completed_files, self.total_files)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let elapsed = self.elapsed();
        ProgressSnapshot {
            total_files: self.total_files,
            completed_files: self.completed_files,
            current_file: self.current_file.clone(),
            succeeded: self.count(FileStatus::Success),
            warnings: self.count(FileStatus::Warning),
            failed: self.count(FileStatus::Error),
            elapsed,
            eta: estimate_remaining(elapsed, self.completed_files, self.total_files),
        }
    }
}
