//! Milestone-only and no-output renderers.

use std::path::Path;

use super::renderer::{percent, ProgressRenderer, RenderError};
use super::state::FileStatus;
use super::terminal::OutputSink;

const MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// Prints a line when progress crosses 25%, 50%, 75% and 100%, plus errors
pub struct MinimalRenderer {
    sink: Box<dyn OutputSink>,
    next_milestone: usize,
    failed: usize,
}

impl MinimalRenderer {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self {
            sink,
            next_milestone: 0,
            failed: 0,
        }
    }

    fn line(&mut self, text: &str) -> Result<(), RenderError> {
        self.sink.write_str(text)?;
        self.sink.write_str("\n")?;
        self.sink.flush()?;
        Ok(())
    }
}

impl ProgressRenderer for MinimalRenderer {
    fn name(&self) -> &'static str {
        "minimal"
    }

    fn start(&mut self, _total: usize) -> Result<(), RenderError> {
        self.next_milestone = 0;
        self.failed = 0;
        Ok(())
    }

    fn update_progress(
        &mut self,
        _current: Option<&Path>,
        completed: usize,
        total: usize,
    ) -> Result<(), RenderError> {
        if total == 0 {
            return Ok(());
        }

        let pct = percent(completed, total);
        // Only the highest crossed milestone is printed when progress jumps
        let mut crossed = None;
        while let Some(&milestone) = MILESTONES.get(self.next_milestone) {
            if pct + f64::EPSILON < f64::from(milestone) {
                break;
            }
            crossed = Some(milestone);
            self.next_milestone += 1;
        }

        match crossed {
            Some(milestone) => self.line(&format!("{milestone}%")),
            None => Ok(()),
        }
    }

    fn update_file_status(&mut self, _file: &Path, status: FileStatus) -> Result<(), RenderError> {
        if status == FileStatus::Error {
            self.failed += 1;
        }
        Ok(())
    }

    fn error(&mut self, file: &Path, message: &str) -> Result<(), RenderError> {
        self.line(&format!("error {}: {}", file.display(), message))
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        if self.failed > 0 {
            let failed = self.failed;
            self.line(&format!("done with {failed} failed"))
        } else {
            self.line("done")
        }
    }

    fn cleanup(&mut self) -> Result<(), RenderError> {
        self.sink.flush()?;
        Ok(())
    }
}

/// Renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentRenderer;

impl ProgressRenderer for SilentRenderer {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn start(&mut self, _total: usize) -> Result<(), RenderError> {
        Ok(())
    }

    fn update_progress(
        &mut self,
        _current: Option<&Path>,
        _completed: usize,
        _total: usize,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn update_file_status(&mut self, _file: &Path, _status: FileStatus) -> Result<(), RenderError> {
        Ok(())
    }

    fn error(&mut self, _file: &Path, _message: &str) -> Result<(), RenderError> {
        Ok(())
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}
