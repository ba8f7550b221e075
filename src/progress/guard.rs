//! Renderer wrapper that absorbs failures and falls back to a simpler renderer.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::metrics::{RENDER_ERRORS, RENDER_FALLBACKS};

use super::minimal::SilentRenderer;
use super::renderer::{ProgressRenderer, RenderError, RenderErrorKind};
use super::state::FileStatus;

pub const DEFAULT_MAX_RENDER_ERRORS: usize = 3;

/// One absorbed renderer failure
#[derive(Debug, Clone)]
pub struct RecordedRenderError {
    pub renderer: &'static str,
    pub operation: &'static str,
    pub kind: RenderErrorKind,
    pub message: String,
}

/// Wraps a renderer so that rendering can never fail a run.
///
/// Every call is shielded against both `Err` returns and panics. After
/// `max_errors` failures of the primary renderer the guard calls `cleanup()`
/// on it, switches permanently to the fallback and replays `start` and the
/// latest progress onto the fallback. Failures of the fallback are recorded
/// but never cause another switch.
pub struct RenderErrorGuard {
    active: Box<dyn ProgressRenderer>,
    fallback: Option<Box<dyn ProgressRenderer>>,
    max_errors: usize,
    primary_errors: usize,
    errors: Vec<RecordedRenderError>,
    fallen_back: bool,
    started_total: Option<usize>,
    last_progress: Option<(Option<PathBuf>, usize, usize)>,
}

impl RenderErrorGuard {
    pub fn new(
        primary: Box<dyn ProgressRenderer>,
        fallback: Box<dyn ProgressRenderer>,
        max_errors: usize,
    ) -> Self {
        Self {
            active: primary,
            fallback: Some(fallback),
            max_errors: max_errors.max(1),
            primary_errors: 0,
            errors: Vec::new(),
            fallen_back: false,
            started_total: None,
            last_progress: None,
        }
    }

    /// Guard with a silent fallback
    pub fn without_fallback(primary: Box<dyn ProgressRenderer>, max_errors: usize) -> Self {
        Self::new(primary, Box::new(SilentRenderer), max_errors)
    }

    pub fn has_fallen_back(&self) -> bool {
        self.fallen_back
    }

    /// Name of the renderer currently receiving calls
    pub fn active_name(&self) -> &'static str {
        self.active.name()
    }

    pub fn errors(&self) -> &[RecordedRenderError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn invoke<F>(&mut self, operation: &'static str, mut call: F)
    where
        F: FnMut(&mut dyn ProgressRenderer) -> Result<(), RenderError>,
    {
        let error = match shielded(self.active.as_mut(), &mut call) {
            Ok(()) => return,
            Err(error) => error,
        };

        self.record(operation, error);

        if self.fallen_back {
            return;
        }

        self.primary_errors += 1;
        if self.primary_errors >= self.max_errors && self.swap_to_fallback() {
            // Give the call that tipped us over a chance on the new renderer
            if let Err(error) = shielded(self.active.as_mut(), &mut call) {
                self.record(operation, error);
            }
        }
    }

    fn record(&mut self, operation: &'static str, error: RenderError) {
        RENDER_ERRORS.inc();
        debug!(
            renderer = self.active.name(),
            operation,
            kind = %error.kind,
            "renderer call failed: {}",
            error.message
        );
        self.errors.push(RecordedRenderError {
            renderer: self.active.name(),
            operation,
            kind: error.kind,
            message: error.message,
        });
    }

    fn swap_to_fallback(&mut self) -> bool {
        let Some(fallback) = self.fallback.take() else {
            return false;
        };

        let mut failed = std::mem::replace(&mut self.active, fallback);
        // Errors from cleaning up the failed renderer are ignored
        let _ = shielded(failed.as_mut(), &mut |r: &mut dyn ProgressRenderer| r.cleanup());
        drop(failed);

        self.fallen_back = true;
        RENDER_FALLBACKS.inc();
        warn!(
            fallback = self.active.name(),
            errors = self.primary_errors,
            "progress renderer failed repeatedly, switching to fallback"
        );

        if let Some(total) = self.started_total {
            if let Err(error) = shielded(self.active.as_mut(), &mut |r: &mut dyn ProgressRenderer| {
                r.start(total)
            }) {
                self.record("start", error);
            }
        }
        if let Some((current, completed, total)) = self.last_progress.clone() {
            if let Err(error) = shielded(self.active.as_mut(), &mut |r: &mut dyn ProgressRenderer| {
                r.update_progress(current.as_deref(), completed, total)
            }) {
                self.record("update_progress", error);
            }
        }
        true
    }
}

/// Run one renderer call, turning a panic into a `RenderFailed` error
fn shielded<F>(renderer: &mut dyn ProgressRenderer, call: &mut F) -> Result<(), RenderError>
where
    F: FnMut(&mut dyn ProgressRenderer) -> Result<(), RenderError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| call(renderer))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "renderer panicked".to_string());
            Err(RenderError::new(RenderErrorKind::RenderFailed, message))
        }
    }
}

impl ProgressRenderer for RenderErrorGuard {
    fn name(&self) -> &'static str {
        self.active.name()
    }

    fn start(&mut self, total: usize) -> Result<(), RenderError> {
        self.started_total = Some(total);
        self.last_progress = None;
        self.invoke("start", |r| r.start(total));
        Ok(())
    }

    fn update_progress(
        &mut self,
        current: Option<&Path>,
        completed: usize,
        total: usize,
    ) -> Result<(), RenderError> {
        self.last_progress = Some((current.map(Path::to_path_buf), completed, total));
        self.invoke("update_progress", |r| {
            r.update_progress(current, completed, total)
        });
        Ok(())
    }

    fn update_file_status(&mut self, file: &Path, status: FileStatus) -> Result<(), RenderError> {
        self.invoke("update_file_status", |r| r.update_file_status(file, status));
        Ok(())
    }

    fn error(&mut self, file: &Path, message: &str) -> Result<(), RenderError> {
        self.invoke("error", |r| r.error(file, message));
        Ok(())
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        self.invoke("complete", |r| r.complete());
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), RenderError> {
        self.invoke("cleanup", |r| r.cleanup());
        Ok(())
    }
}
