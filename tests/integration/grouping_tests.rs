use std::path::Path;

use anyhow::Result;
use reviewpipe::grouping::{DirectoryTree, FileGrouper, GroupBy, GroupFilter, GroupSort};
use reviewpipe::processing::{ExecutionMode, RunOptions};

use crate::helpers::{paths, Script, ScriptedAnalyzer, TestHarness};

fn project_files() -> Vec<std::path::PathBuf> {
    paths(&[
        "README.md",
        "src/main.rs",
        "src/lib.rs",
        "src/util/strings.rs",
        "tests/it.rs",
        "vendor/dep/lib.rs",
    ])
}

#[tokio::test]
async fn test_directory_grouping_runs_groups_in_order() -> Result<()> {
    let harness = TestHarness::new()?;
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::new(&[("src/lib.rs", Script::Warn("todo"))]);

    let grouper = FileGrouper::new(GroupBy::Directory).with_sort(GroupSort::Alphabetical);
    let report = orchestrator
        .run(&project_files(), &analyzer, RunOptions::default().with_grouping(grouper))
        .await?;

    let keys: Vec<_> = report.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, [".", "src", "src/util", "tests", "vendor/dep"]);

    let src = report.groups.iter().find(|g| g.key == "src").unwrap();
    assert_eq!(src.files, 2);
    assert_eq!(src.summary.warnings, 1);
    assert_eq!(src.summary.succeeded, 1);

    // Results follow group order, not input order
    assert_eq!(report.results[0].file, Path::new("README.md"));
    assert_eq!(report.results.len(), 6);
    assert_eq!(orchestrator.progress().completed_files, 6);

    let tree = report.tree.expect("directory grouping builds a tree");
    assert_eq!(tree.total_files(), 6);
    assert_eq!(tree.find("src").unwrap().total_files, 3);
    Ok(())
}

#[tokio::test]
async fn test_excluded_groups_are_never_analyzed() -> Result<()> {
    let harness = TestHarness::new()?;
    let mut orchestrator = harness.orchestrator();
    let analyzer = ScriptedAnalyzer::default();

    let grouper = FileGrouper::new(GroupBy::Directory)
        .with_filter(GroupFilter::new(Vec::new(), vec!["vendor".to_string()]));
    let report = orchestrator
        .run(
            &project_files(),
            &analyzer,
            RunOptions::default()
                .with_grouping(grouper)
                .with_mode(ExecutionMode::Concurrent),
        )
        .await?;

    assert_eq!(report.excluded, vec!["vendor/dep".to_string()]);
    assert_eq!(report.results.len(), 5);
    assert_eq!(analyzer.calls("vendor/dep/lib.rs"), 0);
    assert_eq!(report.summary.total, 5);
    Ok(())
}

#[tokio::test]
async fn test_filetype_grouping_sorted_by_count() -> Result<()> {
    let harness = TestHarness::new()?;
    let mut orchestrator = harness.orchestrator();

    let grouper = FileGrouper::new(GroupBy::FileType).with_sort(GroupSort::FileCount);
    let mut files = project_files();
    files.push("Makefile".into());
    let report = orchestrator
        .run(&files, &ScriptedAnalyzer::default(), RunOptions::default().with_grouping(grouper))
        .await?;

    let keys: Vec<_> = report.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, ["rs", "md", "no-extension"]);
    assert!(report.tree.is_none());
    Ok(())
}

#[test]
fn test_tree_render_lists_nested_directories() {
    let grouper = FileGrouper::new(GroupBy::Directory);
    let tree = DirectoryTree::build(&project_files(), &grouper);

    let lines = tree.render(false);
    assert!(lines.iter().any(|l| l.contains("util/") && l.contains("(1 file)")));
    assert!(lines.iter().all(|l| !l.contains('├')));
}
