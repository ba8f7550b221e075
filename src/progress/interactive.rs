//! Single-line redrawn progress display for ANSI terminals.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use console::Style;

use super::renderer::{
    format_elapsed, format_eta, percent, ProgressRenderer, RenderError, RenderErrorKind,
    RendererOptions, Throttle,
};
use super::state::{estimate_remaining, throughput, FileStatus};
use super::terminal::{MemoryProbe, OutputSink, TerminalCapabilities};

const CLEAR_LINE: &str = "\r\x1b[2K";
const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const BAR_WIDTH: usize = 30;

const UNICODE_SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const ASCII_SPINNER: &[&str] = &["|", "/", "-", "\\"];

struct Palette {
    bar: Style,
    success: Style,
    warning: Style,
    error: Style,
    dim: Style,
}

impl Palette {
    fn new(color: bool) -> Self {
        let style = |s: Style| s.force_styling(color);
        Self {
            bar: style(Style::new().cyan()),
            success: style(Style::new().green()),
            warning: style(Style::new().yellow()),
            error: style(Style::new().red().bold()),
            dim: style(Style::new().dim()),
        }
    }
}

pub struct InteractiveRenderer {
    sink: Box<dyn OutputSink>,
    capabilities: TerminalCapabilities,
    memory: Arc<dyn MemoryProbe>,
    palette: Palette,
    throttle: Throttle,
    started_at: Instant,
    total: usize,
    completed: usize,
    current: Option<String>,
    frame: usize,
    cursor_hidden: bool,
}

impl InteractiveRenderer {
    pub fn new(sink: Box<dyn OutputSink>, options: &RendererOptions) -> Self {
        Self {
            sink,
            capabilities: options.capabilities,
            memory: options.memory.clone(),
            palette: Palette::new(options.capabilities.supports_color),
            throttle: Throttle::new(options.throttle),
            started_at: Instant::now(),
            total: 0,
            completed: 0,
            current: None,
            frame: 0,
            cursor_hidden: false,
        }
    }

    fn spinner(&mut self) -> &'static str {
        let frames = if self.capabilities.supports_unicode {
            UNICODE_SPINNER
        } else {
            ASCII_SPINNER
        };
        self.frame = self.frame.wrapping_add(1);
        frames[self.frame % frames.len()]
    }

    fn bar(&self) -> String {
        let filled = if self.total == 0 {
            BAR_WIDTH
        } else {
            (self.completed.min(self.total) * BAR_WIDTH) / self.total
        };
        let (full, head, empty) = if self.capabilities.supports_unicode {
            ("█", "▌", "░")
        } else {
            ("#", ">", "-")
        };

        let mut bar = full.repeat(filled);
        if filled < BAR_WIDTH {
            bar.push_str(head);
            bar.push_str(&empty.repeat(BAR_WIDTH - filled - 1));
        }
        bar
    }

    fn status_line(&mut self) -> String {
        let elapsed = self.started_at.elapsed();
        let spinner = self.spinner();
        let eta = format_eta(estimate_remaining(elapsed, self.completed, self.total));
        let rate = throughput(elapsed, self.completed)
            .map(|r| format!("{r:.1}/s"))
            .unwrap_or_else(|| "--/s".to_string());

        let mut line = format!(
            "{} [{}] {:>3.0}% {}/{} eta {} {}",
            spinner,
            self.palette.bar.apply_to(self.bar()),
            percent(self.completed, self.total),
            self.completed,
            self.total,
            eta,
            rate,
        );

        if let Some(bytes) = self.memory.resident_bytes() {
            line.push_str(&format!(" mem {:.1}MB", bytes as f64 / (1024.0 * 1024.0)));
        }
        if let Some(current) = &self.current {
            line.push_str(&format!(" {}", self.palette.dim.apply_to(current)));
        }
        line
    }

    fn redraw(&mut self) -> Result<(), RenderError> {
        let line = self.status_line();
        self.sink.write_str(CLEAR_LINE)?;
        self.sink.write_str(&line)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Print a full line above the progress line; the progress line itself
    /// is redrawn only when the throttle allows it
    fn print_above(&mut self, text: &str) -> Result<(), RenderError> {
        self.sink.write_str(CLEAR_LINE)?;
        self.sink.write_str(text)?;
        self.sink.write_str("\n")?;

        if self.throttle.ready(Instant::now()) {
            self.redraw()
        } else {
            self.sink.flush()?;
            Ok(())
        }
    }
}

impl ProgressRenderer for InteractiveRenderer {
    fn name(&self) -> &'static str {
        "interactive"
    }

    fn start(&mut self, total: usize) -> Result<(), RenderError> {
        if !self.capabilities.supports_ansi {
            return Err(RenderError::new(
                RenderErrorKind::AnsiUnsupported,
                "interactive progress needs ANSI escape support",
            ));
        }

        self.total = total;
        self.completed = 0;
        self.current = None;
        self.started_at = Instant::now();
        self.throttle.reset();

        self.sink.write_str(HIDE_CURSOR)?;
        self.cursor_hidden = true;
        self.throttle.ready(Instant::now());
        self.redraw()
    }

    fn update_progress(
        &mut self,
        current: Option<&Path>,
        completed: usize,
        total: usize,
    ) -> Result<(), RenderError> {
        self.completed = completed;
        self.total = total;
        self.current = current.map(|p| p.display().to_string());

        if self.throttle.ready(Instant::now()) {
            self.redraw()?;
        }
        Ok(())
    }

    fn update_file_status(&mut self, file: &Path, status: FileStatus) -> Result<(), RenderError> {
        let (mark, style) = match (status, self.capabilities.supports_unicode) {
            (FileStatus::Success, true) => ("✔", &self.palette.success),
            (FileStatus::Success, false) => ("ok", &self.palette.success),
            (FileStatus::Warning, true) => ("⚠", &self.palette.warning),
            (FileStatus::Warning, false) => ("warn", &self.palette.warning),
            // Errors are printed by error()
            _ => return Ok(()),
        };
        let text = format!("{} {}", style.apply_to(mark), file.display());
        self.print_above(&text)
    }

    fn error(&mut self, file: &Path, message: &str) -> Result<(), RenderError> {
        let mark = if self.capabilities.supports_unicode {
            "✖"
        } else {
            "error"
        };
        let text = format!(
            "{} {}: {}",
            self.palette.error.apply_to(mark),
            file.display(),
            message
        );
        self.print_above(&text)
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        self.throttle.take_pending();
        self.current = None;
        self.redraw()?;

        let summary = format!(
            "\n{} {} files in {}\n",
            self.palette.success.apply_to("done"),
            self.completed,
            format_elapsed(self.started_at.elapsed())
        );
        self.sink.write_str(&summary)?;
        self.sink.flush()?;
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), RenderError> {
        if self.cursor_hidden {
            self.cursor_hidden = false;
            self.sink.write_str(SHOW_CURSOR)?;
            self.sink.flush()?;
        }
        Ok(())
    }
}

impl Drop for InteractiveRenderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
