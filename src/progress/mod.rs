//! Progress tracking and rendering
//!
//! `ProgressState` holds the per-run counters, renderers turn state
//! transitions into terminal output, and `RenderErrorGuard` keeps rendering
//! failures from ever reaching the caller.

pub mod events;
pub mod guard;
pub mod interactive;
pub mod minimal;
pub mod plain;
pub mod renderer;
pub mod state;
pub mod terminal;

pub use events::{ChannelObserver, ProgressEvent, ProgressObserver};
pub use guard::{RecordedRenderError, RenderErrorGuard, DEFAULT_MAX_RENDER_ERRORS};
pub use interactive::InteractiveRenderer;
pub use minimal::{MinimalRenderer, SilentRenderer};
pub use plain::PlainRenderer;
pub use renderer::{
    build_renderer, format_eta, select_renderer, ProgressMode, ProgressRenderer, RenderError,
    RenderErrorKind, RendererKind, RendererOptions, Throttle,
};
pub use state::{
    estimate_remaining, throughput, FileMessage, FileStatus, ProgressSnapshot, ProgressState,
};
pub use terminal::{
    MemoryProbe, NoMemoryProbe, OutputSink, ProcMemoryProbe, SharedBuffer, TermSink,
    TerminalCapabilities, WriterSink,
};

use crate::config::ProgressConfig;

/// Build the guarded renderer for a run.
///
/// The primary renderer is chosen from `capabilities` and the configured
/// mode; `make_sink` is called once for the primary and once for the
/// fallback.
pub fn guarded_renderer<S>(
    capabilities: TerminalCapabilities,
    config: &ProgressConfig,
    options: &RendererOptions,
    mut make_sink: S,
) -> RenderErrorGuard
where
    S: FnMut() -> Box<dyn OutputSink>,
{
    let kind = select_renderer(&capabilities, config.mode);
    let fallback_kind = select_renderer(&TerminalCapabilities::plain(), config.fallback);

    tracing::debug!(?kind, ?fallback_kind, "selected progress renderer");

    let primary = build_renderer(kind, make_sink(), options);
    let fallback = build_renderer(fallback_kind, make_sink(), options);
    RenderErrorGuard::new(primary, fallback, config.max_render_errors)
}
