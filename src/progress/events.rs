//! Typed progress events and observers.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::processing::GroupSummary;

use super::state::FileStatus;

/// Events emitted while a run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        run_id: String,
        total: usize,
    },
    GroupStarted {
        key: String,
        /// Position of the group in processing order (0-based)
        index: usize,
        files: usize,
    },
    FileStarted {
        file: PathBuf,
        /// Position of the file in the run (0-based)
        index: usize,
    },
    FileRetrying {
        file: PathBuf,
        /// The attempt that just failed (1-indexed)
        attempt: u32,
        delay: Duration,
        error: String,
    },
    FileFinished {
        file: PathBuf,
        status: FileStatus,
        duration: Duration,
        message: Option<String>,
    },
    GroupCompleted {
        key: String,
        summary: GroupSummary,
    },
    RunCompleted {
        summary: GroupSummary,
        aborted: bool,
    },
}

/// Receives progress events. Implementations must be cheap and must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_event(&self, event: &ProgressEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(event.clone());
    }
}
