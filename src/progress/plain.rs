//! Line-per-event output for pipes, CI logs and dumb terminals.

use std::path::Path;
use std::time::Instant;

use super::renderer::{
    format_elapsed, format_eta, percent, ProgressRenderer, RenderError, RendererOptions, Throttle,
};
use super::state::{estimate_remaining, FileStatus};
use super::terminal::OutputSink;

pub struct PlainRenderer {
    sink: Box<dyn OutputSink>,
    throttle: Throttle,
    started_at: Instant,
    total: usize,
    completed: usize,
    last_line: Option<String>,
    succeeded: usize,
    warnings: usize,
    failed: usize,
}

impl PlainRenderer {
    pub fn new(sink: Box<dyn OutputSink>, options: &RendererOptions) -> Self {
        Self {
            sink,
            throttle: Throttle::new(options.throttle),
            started_at: Instant::now(),
            total: 0,
            completed: 0,
            last_line: None,
            succeeded: 0,
            warnings: 0,
            failed: 0,
        }
    }

    fn line(&mut self, text: &str) -> Result<(), RenderError> {
        self.sink.write_str(text)?;
        self.sink.write_str("\n")?;
        self.sink.flush()?;
        Ok(())
    }

    fn progress_line(&self, current: Option<&Path>) -> String {
        let eta = format_eta(estimate_remaining(
            self.started_at.elapsed(),
            self.completed,
            self.total,
        ));
        let mut line = format!(
            "[{}/{}] {:.0}% eta {}",
            self.completed,
            self.total,
            percent(self.completed, self.total),
            eta
        );
        if let Some(current) = current {
            line.push_str(&format!(" {}", current.display()));
        }
        line
    }
}

impl ProgressRenderer for PlainRenderer {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn start(&mut self, total: usize) -> Result<(), RenderError> {
        self.total = total;
        self.completed = 0;
        self.succeeded = 0;
        self.warnings = 0;
        self.failed = 0;
        self.last_line = None;
        self.started_at = Instant::now();
        self.throttle.reset();
        self.line(&format!("Processing {total} files"))
    }

    fn update_progress(
        &mut self,
        current: Option<&Path>,
        completed: usize,
        total: usize,
    ) -> Result<(), RenderError> {
        self.completed = completed;
        self.total = total;
        let line = self.progress_line(current);

        if self.throttle.ready(Instant::now()) {
            self.last_line = None;
            self.line(&line)
        } else {
            self.last_line = Some(line);
            Ok(())
        }
    }

    fn update_file_status(&mut self, file: &Path, status: FileStatus) -> Result<(), RenderError> {
        match status {
            FileStatus::Success => {
                self.succeeded += 1;
                self.line(&format!("ok {}", file.display()))
            }
            FileStatus::Warning => {
                self.warnings += 1;
                self.line(&format!("warning {}", file.display()))
            }
            FileStatus::Error => {
                self.failed += 1;
                Ok(())
            }
            FileStatus::Pending | FileStatus::Processing => Ok(()),
        }
    }

    fn error(&mut self, file: &Path, message: &str) -> Result<(), RenderError> {
        self.line(&format!("error {}: {}", file.display(), message))
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        // Flush the last suppressed progress line
        if self.throttle.take_pending() {
            if let Some(line) = self.last_line.take() {
                self.line(&line)?;
            }
        }

        let summary = format!(
            "Done: {} files in {} ({} ok, {} warnings, {} failed)",
            self.completed,
            format_elapsed(self.started_at.elapsed()),
            self.succeeded,
            self.warnings,
            self.failed
        );
        self.line(&summary)
    }

    fn cleanup(&mut self) -> Result<(), RenderError> {
        self.sink.flush()?;
        Ok(())
    }
}
