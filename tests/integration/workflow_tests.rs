use anyhow::Result;
use reviewpipe::analyzers::LineStatsAnalyzer;
use reviewpipe::grouping::{FileGrouper, GroupBy};
use reviewpipe::processing::{ExecutionMode, FailureKind, RunOptions};
use reviewpipe::progress::FileStatus;
use reviewpipe::sources::{resolve_inputs, WalkSource};

use crate::helpers::TestHarness;

#[tokio::test]
async fn test_review_project_end_to_end() -> Result<()> {
    let mut harness = TestHarness::new()?;
    harness.create_test_file("src/main.rs", "fn main() {\n    run();\n}\n")?;
    harness.create_test_file("src/lib.rs", "// TODO: split this module\npub fn run() {}\n")?;
    harness.create_test_file("src/net/client.rs", "pub struct Client;\n")?;
    harness.create_test_file("docs/guide.md", "# Guide\n")?;
    harness.create_test_file("target/debug/build.rs", "fn generated() {}\n")?;

    let walk = WalkSource::default()
        .with_extensions(vec!["rs".to_string()])
        .with_ignore_patterns(vec!["target".to_string()]);
    let files = resolve_inputs(&[harness.path().to_path_buf()], &walk)?;
    assert_eq!(files.len(), 3);

    harness.config.processing.max_concurrency = 2;
    let mut orchestrator = harness.orchestrator();
    let options = RunOptions::default()
        .with_mode(ExecutionMode::Concurrent)
        .with_grouping(FileGrouper::new(GroupBy::Directory).with_base(harness.path()));

    let report = orchestrator
        .run(&files, &LineStatsAnalyzer::default(), options)
        .await?;

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.summary.warnings, 1);
    assert_eq!(report.summary.succeeded, 2);
    let keys: Vec<_> = report.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, ["src", "src/net"]);

    let lib = report
        .results
        .iter()
        .find(|r| r.file.ends_with("src/lib.rs"))
        .unwrap();
    assert_eq!(lib.status, FileStatus::Warning);
    assert_eq!(lib.analysis.as_ref().unwrap().todo_markers, 1);

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["summary"]["total"], 3);
    assert!(json["results"][0]["duration_ms"].is_u64());
    Ok(())
}

#[tokio::test]
async fn test_vanished_file_fails_without_retries() -> Result<()> {
    let harness = TestHarness::new()?;
    let present = harness.create_test_file("a.rs", "fn a() {}\n")?;
    let missing = harness.path().join("gone.rs");

    let mut orchestrator = harness.orchestrator();
    let report = orchestrator
        .run(
            &[present, missing.clone()],
            &LineStatsAnalyzer::default(),
            RunOptions::default(),
        )
        .await?;

    let gone = report.result_for(&missing).unwrap();
    assert_eq!(gone.attempts, 1);
    assert_eq!(gone.failure, Some(FailureKind::NonRetryable));
    assert!(report.has_failures());
    assert_eq!(report.summary.succeeded, 1);
    Ok(())
}
