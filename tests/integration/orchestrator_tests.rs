use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use reviewpipe::processing::{ExecutionMode, FailureKind, RunOptions};
use reviewpipe::progress::{ChannelObserver, FileStatus, ProgressEvent};
use reviewpipe::retry::CircuitBreakerConfig;
use std::sync::Arc;

use crate::helpers::{fast_retry, paths, CallLog, RecordingRenderer, Script, ScriptedAnalyzer, TestHarness};

#[tokio::test]
async fn test_sequential_run_reports_every_file_in_order() -> Result<()> {
    let harness = TestHarness::new()?;
    let log = CallLog::default();
    let mut orchestrator =
        harness.orchestrator_with(TestHarness::guarded(RecordingRenderer::new("rec", log.clone())));
    let analyzer = ScriptedAnalyzer::new(&[("b.rs", Script::Warn("style"))]);
    let files = paths(&["c.rs", "a.rs", "b.rs", "d.rs"]);

    let report = orchestrator.run(&files, &analyzer, RunOptions::default()).await?;

    let order: Vec<_> = report.results.iter().map(|r| r.file.clone()).collect();
    assert_eq!(order, files);
    assert_eq!(analyzer.call_order(), files);
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.warnings, 1);
    assert_eq!(report.summary.succeeded, 3);
    assert_eq!(orchestrator.progress().completed_files, 4);

    let calls = log.calls();
    assert_eq!(calls.first().map(String::as_str), Some("start 4"));
    assert_eq!(&calls[calls.len() - 2..], ["complete", "cleanup"]);
    assert_eq!(log.count("status "), 4);
    assert!(calls.contains(&"progress 4/4".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_run_is_bounded_and_keeps_input_order() -> Result<()> {
    let mut harness = TestHarness::new()?;
    harness.config.processing.max_concurrency = 2;
    let mut orchestrator = harness.orchestrator();

    // Earlier files take longer, so completion order is reversed
    let analyzer = ScriptedAnalyzer::new(&[
        ("0.rs", Script::Slow(Duration::from_millis(40))),
        ("1.rs", Script::Slow(Duration::from_millis(30))),
        ("2.rs", Script::Slow(Duration::from_millis(20))),
        ("3.rs", Script::Slow(Duration::from_millis(10))),
        ("4.rs", Script::Slow(Duration::from_millis(1))),
    ]);
    let files = paths(&["0.rs", "1.rs", "2.rs", "3.rs", "4.rs"]);

    let report = orchestrator
        .run(
            &files,
            &analyzer,
            RunOptions::default().with_mode(ExecutionMode::Concurrent),
        )
        .await?;

    let order: Vec<_> = report.results.iter().map(|r| r.file.clone()).collect();
    assert_eq!(order, files);
    assert!(analyzer.peak_concurrency() <= 2);
    assert_eq!(orchestrator.gate().in_flight(), 0);
    assert!(!report.has_failures());
    Ok(())
}

#[tokio::test]
async fn test_retry_counts_per_failure_class() -> Result<()> {
    let harness = TestHarness::new()?;
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::new(&[
        ("flaky.rs", Script::FlakyThenOk(2)),
        ("down.rs", Script::AlwaysTransient),
        ("denied.rs", Script::Permanent),
    ]);

    let report = orchestrator
        .run(
            &paths(&["flaky.rs", "down.rs", "denied.rs"]),
            &analyzer,
            RunOptions::default(),
        )
        .await?;

    let flaky = report.result_for(Path::new("flaky.rs")).unwrap();
    assert!(flaky.success);
    assert_eq!(flaky.attempts, 3);

    let down = report.result_for(Path::new("down.rs")).unwrap();
    assert_eq!(down.status, FileStatus::Error);
    assert_eq!(down.attempts, 3);
    assert_eq!(down.failure, Some(FailureKind::Exhausted));
    assert!(down.error.as_deref().unwrap().contains("connection reset"));

    let denied = report.result_for(Path::new("denied.rs")).unwrap();
    assert_eq!(denied.attempts, 1);
    assert_eq!(denied.failure, Some(FailureKind::NonRetryable));
    assert_eq!(analyzer.calls("denied.rs"), 1);
    Ok(())
}

#[tokio::test]
async fn test_run_level_retry_override() -> Result<()> {
    let harness = TestHarness::new()?;
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::new(&[("down.rs", Script::AlwaysTransient)]);

    let report = orchestrator
        .run(
            &paths(&["down.rs"]),
            &analyzer,
            RunOptions::default().with_retry(fast_retry(5)),
        )
        .await?;

    assert_eq!(report.results[0].attempts, 5);

    let mut invalid = fast_retry(1);
    invalid.max_attempts = 0;
    let rejected = orchestrator
        .run(&paths(&["down.rs"]), &analyzer, RunOptions::default().with_retry(invalid))
        .await;
    assert!(rejected.is_err());
    Ok(())
}

#[tokio::test]
async fn test_attempt_timeout_is_retried() -> Result<()> {
    let mut harness = TestHarness::new()?;
    harness.config.retry = fast_retry(2);
    harness.config.processing.timeout_ms = Some(5);
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::new(&[("slow.rs", Script::Slow(Duration::from_millis(200)))]);

    let report = orchestrator
        .run(&paths(&["slow.rs"]), &analyzer, RunOptions::default())
        .await?;

    let slow = &report.results[0];
    assert_eq!(slow.attempts, 2);
    assert_eq!(slow.failure, Some(FailureKind::Exhausted));
    assert!(slow.error.as_deref().unwrap().contains("timed out"));
    Ok(())
}

#[tokio::test]
async fn test_strict_mode_stops_after_first_failure() -> Result<()> {
    let harness = TestHarness::new()?;
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::new(&[("b.rs", Script::Permanent)]);

    let report = orchestrator
        .run(
            &paths(&["a.rs", "b.rs", "c.rs", "d.rs"]),
            &analyzer,
            RunOptions::default().strict(),
        )
        .await?;

    assert!(report.aborted);
    assert_eq!(report.results.len(), 2);
    assert_eq!(analyzer.calls("c.rs"), 0);
    Ok(())
}

#[tokio::test]
async fn test_open_circuit_rejects_remaining_files() -> Result<()> {
    let mut harness = TestHarness::new()?;
    harness.config.circuit_breaker.enabled = true;
    harness.config.circuit_breaker.failure_threshold = 1;
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::new(&[("a.rs", Script::AlwaysTransient)]);

    let report = orchestrator
        .run(&paths(&["a.rs", "b.rs"]), &analyzer, RunOptions::default())
        .await?;

    let b = report.result_for(Path::new("b.rs")).unwrap();
    assert_eq!(b.failure, Some(FailureKind::CircuitOpen));
    assert_eq!(b.attempts, 0);
    assert_eq!(analyzer.calls("b.rs"), 0);
    Ok(())
}

#[tokio::test]
async fn test_bad_inputs_do_not_trip_default_circuit() -> Result<()> {
    let mut harness = TestHarness::new()?;
    harness.config.circuit_breaker = CircuitBreakerConfig::default();
    let mut orchestrator = harness.orchestrator();
    let bad = ["bin1", "bin2", "bin3", "bin4", "bin5", "bin6"];
    let script: Vec<_> = bad.iter().map(|name| (*name, Script::Permanent)).collect();
    let analyzer = ScriptedAnalyzer::new(&script);

    let mut names = bad.to_vec();
    names.extend(["good1.rs", "good2.rs"]);
    let report = orchestrator
        .run(&paths(&names), &analyzer, RunOptions::default())
        .await?;

    assert_eq!(report.summary.failed, 6);
    assert_eq!(report.summary.succeeded, 2);
    for name in bad {
        let result = report.result_for(Path::new(name)).unwrap();
        assert_eq!(result.failure, Some(FailureKind::NonRetryable));
        assert_eq!(result.attempts, 1);
    }
    assert_eq!(analyzer.calls("good1.rs"), 1);
    assert_eq!(analyzer.calls("good2.rs"), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_input_still_starts_and_completes() -> Result<()> {
    let harness = TestHarness::new()?;
    let log = CallLog::default();
    let mut orchestrator =
        harness.orchestrator_with(TestHarness::guarded(RecordingRenderer::new("rec", log.clone())));

    let report = orchestrator
        .run(&[], &ScriptedAnalyzer::default(), RunOptions::default())
        .await?;

    assert!(report.results.is_empty());
    assert_eq!(report.summary.total, 0);
    assert_eq!(report.summary.success_rate, 0.0);
    assert_eq!(log.calls(), vec!["start 0", "complete", "cleanup"]);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_inputs_are_processed_once() -> Result<()> {
    let harness = TestHarness::new()?;
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::default();

    let report = orchestrator
        .run(&paths(&["a.rs", "b.rs", "a.rs"]), &analyzer, RunOptions::default())
        .await?;

    assert_eq!(report.results.len(), 2);
    assert_eq!(analyzer.calls("a.rs"), 1);
    Ok(())
}

#[tokio::test]
async fn test_event_stream_brackets_the_run() -> Result<()> {
    let harness = TestHarness::new()?;
    let (observer, mut rx) = ChannelObserver::channel();
    let mut orchestrator = harness.orchestrator().with_observer(Arc::new(observer));
    let analyzer = ScriptedAnalyzer::new(&[("a.rs", Script::FlakyThenOk(1))]);

    orchestrator
        .run(&paths(&["a.rs", "b.rs"]), &analyzer, RunOptions::default())
        .await?;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(ProgressEvent::RunStarted { total: 2, .. })));
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::RunCompleted { aborted: false, .. })
    ));
    let retries = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::FileRetrying { attempt: 1, .. }))
        .count();
    assert_eq!(retries, 1);
    let finished = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::FileFinished { .. }))
        .count();
    assert_eq!(finished, 2);
    Ok(())
}
