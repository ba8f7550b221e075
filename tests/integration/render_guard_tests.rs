use anyhow::Result;
use reviewpipe::config::ProgressConfig;
use reviewpipe::processing::RunOptions;
use reviewpipe::progress::{
    guarded_renderer, ProgressMode, ProgressRenderer, RenderErrorGuard, RenderErrorKind,
    RendererOptions, SharedBuffer, TerminalCapabilities,
};

use crate::helpers::{paths, BrokenRenderer, CallLog, RecordingRenderer, ScriptedAnalyzer, TestHarness};

#[tokio::test]
async fn test_failing_renderer_swaps_to_fallback_mid_run() -> Result<()> {
    let harness = TestHarness::new()?;
    let log = CallLog::default();
    let broken = BrokenRenderer::new(false);
    let broken_calls = broken.calls.clone();
    let guard = RenderErrorGuard::new(
        Box::new(broken),
        Box::new(RecordingRenderer::new("fallback", log.clone())),
        3,
    );
    let mut orchestrator = harness.orchestrator_with(guard);

    let report = orchestrator
        .run(&paths(&["a.rs", "b.rs", "c.rs"]), &ScriptedAnalyzer::default(), RunOptions::default())
        .await?;

    // Rendering problems never touch the results
    assert_eq!(report.results.len(), 3);
    assert!(!report.has_failures());
    assert!(orchestrator.renderer_fallen_back());
    assert_eq!(*broken_calls.lock(), 3 + 1);
    assert_eq!(report.render_errors, 3);

    let calls = log.calls();
    assert_eq!(calls[0], "start 3");
    assert!(calls.contains(&"progress 3/3".to_string()));
    assert_eq!(&calls[calls.len() - 2..], ["complete", "cleanup"]);
    Ok(())
}

#[tokio::test]
async fn test_panicking_renderer_is_contained() -> Result<()> {
    let harness = TestHarness::new()?;
    let guard = RenderErrorGuard::without_fallback(Box::new(BrokenRenderer::new(true)), 2);
    let mut orchestrator = harness.orchestrator_with(guard);

    let report = orchestrator
        .run(&paths(&["a.rs", "b.rs"]), &ScriptedAnalyzer::default(), RunOptions::default())
        .await?;

    assert_eq!(report.summary.succeeded, 2);
    assert!(orchestrator.renderer_fallen_back());
    Ok(())
}

#[test]
fn test_guard_records_error_kinds() {
    let mut guard = RenderErrorGuard::without_fallback(Box::new(BrokenRenderer::new(false)), 5);

    assert!(guard.start(2).is_ok());
    assert!(guard.complete().is_ok());

    assert_eq!(guard.error_count(), 2);
    assert!(!guard.has_fallen_back());
    assert!(guard
        .errors()
        .iter()
        .all(|e| e.kind == RenderErrorKind::RenderFailed && e.renderer == "broken"));
    assert_eq!(guard.errors()[1].operation, "complete");
}

#[test]
fn test_renderer_selection_follows_capabilities() {
    let buffer = SharedBuffer::new();
    let mut config = ProgressConfig::default();
    let options = RendererOptions::from_config(TerminalCapabilities::plain(), &config);

    let piped = guarded_renderer(TerminalCapabilities::plain(), &config, &options, || {
        Box::new(buffer.clone())
    });
    assert_eq!(piped.active_name(), "plain");

    let mut no_ansi = TerminalCapabilities::full();
    no_ansi.supports_ansi = false;
    let dumb = guarded_renderer(no_ansi, &config, &options, || Box::new(buffer.clone()));
    assert_eq!(dumb.active_name(), "plain");

    config.mode = ProgressMode::Minimal;
    let minimal = guarded_renderer(TerminalCapabilities::full(), &config, &options, || {
        Box::new(buffer.clone())
    });
    assert_eq!(minimal.active_name(), "minimal");
}

#[test]
fn test_plain_output_through_guard() {
    let buffer = SharedBuffer::new();
    let config = ProgressConfig {
        mode: ProgressMode::Plain,
        throttle_ms: 0,
        ..ProgressConfig::default()
    };
    let options = RendererOptions::from_config(TerminalCapabilities::plain(), &config);
    let mut guard = guarded_renderer(TerminalCapabilities::plain(), &config, &options, || {
        Box::new(buffer.clone())
    });

    guard.start(1).unwrap();
    guard
        .update_progress(Some(std::path::Path::new("a.rs")), 0, 1)
        .unwrap();
    guard.complete().unwrap();

    let lines = buffer.lines();
    assert_eq!(lines[0], "Processing 1 files");
    assert!(lines.iter().any(|l| l.starts_with("Done: ")));
    assert!(lines.iter().all(|l| !l.contains('\x1b')));
}
