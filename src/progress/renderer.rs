//! Renderer interface, render errors, throttling and variant selection.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use indicatif::HumanDuration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProgressConfig;

use super::interactive::InteractiveRenderer;
use super::minimal::{MinimalRenderer, SilentRenderer};
use super::plain::PlainRenderer;
use super::state::FileStatus;
use super::terminal::{MemoryProbe, OutputSink, TerminalCapabilities};

/// Why a renderer call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    TerminalUnsupported,
    AnsiUnsupported,
    RenderFailed,
    Resource,
}

impl std::fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TerminalUnsupported => write!(f, "terminal unsupported"),
            Self::AnsiUnsupported => write!(f, "ANSI unsupported"),
            Self::RenderFailed => write!(f, "render failure"),
            Self::Resource => write!(f, "resource failure"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::Unsupported => RenderErrorKind::TerminalUnsupported,
            _ => RenderErrorKind::Resource,
        };
        Self::new(kind, error.to_string())
    }
}

/// Consumes progress transitions and produces human output
pub trait ProgressRenderer: Send {
    fn name(&self) -> &'static str;

    fn start(&mut self, total: usize) -> Result<(), RenderError>;

    fn update_progress(
        &mut self,
        current: Option<&Path>,
        completed: usize,
        total: usize,
    ) -> Result<(), RenderError>;

    fn update_file_status(&mut self, file: &Path, status: FileStatus) -> Result<(), RenderError>;

    fn error(&mut self, file: &Path, message: &str) -> Result<(), RenderError>;

    fn complete(&mut self) -> Result<(), RenderError>;

    /// Restore the terminal; called on swap-out and at the end of a run
    fn cleanup(&mut self) -> Result<(), RenderError>;
}

/// Requested renderer, `Auto` picks from the terminal capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    #[default]
    Auto,
    Interactive,
    Plain,
    Minimal,
    Silent,
}

/// Concrete renderer variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Interactive,
    Plain,
    Minimal,
    Silent,
}

/// Pick the renderer variant for the given terminal
pub fn select_renderer(capabilities: &TerminalCapabilities, mode: ProgressMode) -> RendererKind {
    let can_draw = capabilities.is_interactive && capabilities.supports_ansi;

    match mode {
        ProgressMode::Auto | ProgressMode::Interactive if can_draw => RendererKind::Interactive,
        ProgressMode::Auto | ProgressMode::Interactive | ProgressMode::Plain => {
            RendererKind::Plain
        }
        ProgressMode::Minimal => RendererKind::Minimal,
        ProgressMode::Silent => RendererKind::Silent,
    }
}

/// Options shared by the concrete renderers
#[derive(Clone)]
pub struct RendererOptions {
    pub capabilities: TerminalCapabilities,
    pub throttle: Duration,
    pub memory: Arc<dyn MemoryProbe>,
}

impl RendererOptions {
    pub fn from_config(capabilities: TerminalCapabilities, config: &ProgressConfig) -> Self {
        let mut capabilities = capabilities;
        if let Some(unicode) = config.unicode {
            capabilities.supports_unicode = unicode;
        }

        Self {
            capabilities,
            throttle: Duration::from_millis(config.throttle_ms),
            memory: Arc::new(super::terminal::NoMemoryProbe),
        }
    }

    pub fn with_memory_probe(mut self, memory: Arc<dyn MemoryProbe>) -> Self {
        self.memory = memory;
        self
    }
}

/// Construct a renderer of the given kind writing to `sink`
pub fn build_renderer(
    kind: RendererKind,
    sink: Box<dyn OutputSink>,
    options: &RendererOptions,
) -> Box<dyn ProgressRenderer> {
    match kind {
        RendererKind::Interactive => Box::new(InteractiveRenderer::new(sink, options)),
        RendererKind::Plain => Box::new(PlainRenderer::new(sink, options)),
        RendererKind::Minimal => Box::new(MinimalRenderer::new(sink)),
        RendererKind::Silent => Box::new(SilentRenderer),
    }
}

/// Rate limiter for progress lines.
///
/// A call arriving at least `interval` after the last emitted line is
/// emitted; calls in between are remembered as pending so the final state
/// can be flushed.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: false,
        }
    }

    /// Whether a line may be emitted at `now`; records the emission when it may
    pub fn ready(&mut self, now: Instant) -> bool {
        let ready = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if ready {
            self.last_emit = Some(now);
            self.pending = false;
        } else {
            self.pending = true;
        }
        ready
    }

    /// Whether a suppressed update is waiting; clears the flag
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = false;
    }
}

/// ETA text, a placeholder until it can be computed
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => HumanDuration(eta).to_string(),
        None => "--".to_string(),
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    HumanDuration(elapsed).to_string()
}

pub fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (completed as f64 * 100.0 / total as f64).min(100.0)
}
