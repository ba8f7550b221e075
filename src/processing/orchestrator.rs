use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::gate::{ConcurrencyGate, GateClosed};
use crate::grouping::{DirectoryTree, FileGrouper, GroupBy};
use crate::metrics::{FILES_PROCESSED, FILE_DURATION};
use crate::progress::{
    FileStatus, ProgressEvent, ProgressObserver, ProgressRenderer, ProgressSnapshot,
    ProgressState, RenderError, RenderErrorGuard,
};
use crate::retry::{
    AttemptTimedOut, CircuitBreaker, ResilientExecutor, RetryConfig, RetryError, RetryPolicy,
};

use super::{AnalysisOutcome, Analyzer, ExecutionMode, FailureKind, GroupSummary, ProcessingResult};

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: ExecutionMode,
    /// Process group by group when set
    pub grouping: Option<FileGrouper>,
    /// When false the run stops scheduling files after the first failure
    pub continue_on_error: bool,
    /// Retry settings for this run only
    pub retry: Option<RetryConfig>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            grouping: None,
            continue_on_error: true,
            retry: None,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        let grouping = (config.grouping.by != GroupBy::None)
            .then(|| FileGrouper::from_config(&config.grouping));

        Self {
            mode: config.processing.mode,
            grouping,
            continue_on_error: config.processing.continue_on_error,
            retry: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_grouping(mut self, grouper: FileGrouper) -> Self {
        self.grouping = Some(grouper);
        self
    }

    pub fn strict(mut self) -> Self {
        self.continue_on_error = false;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Summary of one processed group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub key: String,
    pub files: usize,
    pub summary: GroupSummary,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<T> {
    pub run_id: String,
    /// Input order, or group processing order when grouped
    pub results: Vec<ProcessingResult<T>>,
    pub summary: GroupSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<DirectoryTree>,
    /// Group keys dropped by the include/exclude filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<String>,
    /// Strict mode stopped the run early
    pub aborted: bool,
    /// Renderer failures absorbed during the run
    pub render_errors: usize,
}

impl<T> RunReport<T> {
    pub fn result_for(&self, file: &Path) -> Option<&ProcessingResult<T>> {
        self.results.iter().find(|r| r.file == file)
    }

    pub fn has_failures(&self) -> bool {
        self.summary.has_failures()
    }
}

/// Runs files through an [`Analyzer`] with retries, gating and progress reporting.
///
/// Runs take `&mut self`, so one orchestrator handles one run at a time;
/// the progress state is reset at the start of every run.
pub struct ProcessingOrchestrator {
    gate: ConcurrencyGate,
    executor: ResilientExecutor,
    timeout: Option<Duration>,
    state: Mutex<ProgressState>,
    renderer: Mutex<RenderErrorGuard>,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl ProcessingOrchestrator {
    pub fn new(gate: ConcurrencyGate, executor: ResilientExecutor, renderer: RenderErrorGuard) -> Self {
        Self {
            gate,
            executor,
            timeout: None,
            state: Mutex::new(ProgressState::new()),
            renderer: Mutex::new(renderer),
            observers: Vec::new(),
        }
    }

    /// Build from validated configuration
    pub fn from_config(config: &Config, renderer: RenderErrorGuard) -> Result<Self, ConfigError> {
        config.validate()?;

        let gate = ConcurrencyGate::new(config.processing.max_concurrency)?;
        let policy = RetryPolicy::new(config.retry.clone())?;
        let breaker = CircuitBreaker::from_config(&config.circuit_breaker)?.map(Arc::new);

        Ok(Self::new(gate, ResilientExecutor::new(policy, breaker), renderer)
            .with_timeout(config.processing.timeout_ms.map(Duration::from_millis)))
    }

    /// Bound every analysis attempt; an elapsed attempt is a retryable failure
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.state.lock().snapshot()
    }

    pub fn render_errors(&self) -> usize {
        self.renderer.lock().error_count()
    }

    pub fn renderer_fallen_back(&self) -> bool {
        self.renderer.lock().has_fallen_back()
    }

    /// Process `files` and return one result per scheduled file.
    ///
    /// Only configuration problems (an invalid per-run retry override) are
    /// returned as errors; analysis and rendering failures end up in the
    /// report.
    pub async fn run<A: Analyzer>(
        &mut self,
        files: &[PathBuf],
        analyzer: &A,
        options: RunOptions,
    ) -> Result<RunReport<A::Output>, ConfigError> {
        let executor = match &options.retry {
            Some(retry) => ResilientExecutor::new(
                self.executor.policy().with_config(retry.clone())?,
                self.executor.breaker().cloned(),
            ),
            None => self.executor.clone(),
        };

        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        let this: &Self = self;

        Ok(this
            .run_inner(run_id, files, analyzer, &executor, options)
            .instrument(span)
            .await)
    }

    async fn run_inner<A: Analyzer>(
        &self,
        run_id: String,
        files: &[PathBuf],
        analyzer: &A,
        executor: &ResilientExecutor,
        options: RunOptions,
    ) -> RunReport<A::Output> {
        let files = dedupe(files);

        let (plan, excluded, tree) = match &options.grouping {
            Some(grouper) => {
                let grouping = grouper.group(&files);
                let tree = (grouper.criterion() == GroupBy::Directory).then(|| {
                    let kept: Vec<PathBuf> = grouping
                        .groups
                        .iter()
                        .flat_map(|g| g.files.iter().cloned())
                        .collect();
                    DirectoryTree::build(&kept, grouper)
                });
                let plan: Vec<(Option<String>, Vec<PathBuf>)> = grouping
                    .groups
                    .into_iter()
                    .map(|g| (Some(g.key), g.files))
                    .collect();
                (plan, grouping.excluded, tree)
            }
            None => (vec![(None, files)], Vec::new(), None),
        };

        let scheduled: Vec<PathBuf> = plan
            .iter()
            .flat_map(|(_, files)| files.iter().cloned())
            .collect();
        let total = scheduled.len();
        self.state.lock().reset(&scheduled);

        info!(
            total,
            mode = ?options.mode,
            groups = plan.len(),
            excluded = excluded.len(),
            "starting run"
        );
        self.emit(&ProgressEvent::RunStarted {
            run_id: run_id.clone(),
            total,
        });
        self.render(|r| r.start(total));

        let abort = AtomicBool::new(false);
        let mut results = Vec::with_capacity(total);
        let mut groups = Vec::new();
        let mut offset = 0;

        for (index, (key, group_files)) in plan.into_iter().enumerate() {
            if abort.load(Ordering::SeqCst) {
                break;
            }

            if let Some(key) = &key {
                debug!(group = %key, files = group_files.len(), "starting group");
                self.emit(&ProgressEvent::GroupStarted {
                    key: key.clone(),
                    index,
                    files: group_files.len(),
                });
            }

            let group_results = self
                .process_batch(
                    &group_files,
                    offset,
                    analyzer,
                    executor,
                    options.mode,
                    options.continue_on_error,
                    &abort,
                )
                .await;
            offset += group_files.len();

            if let Some(key) = key {
                let summary = GroupSummary::from_results(&group_results);
                self.emit(&ProgressEvent::GroupCompleted {
                    key: key.clone(),
                    summary: summary.clone(),
                });
                groups.push(GroupReport {
                    key,
                    files: group_files.len(),
                    summary,
                });
            }

            results.extend(group_results);
        }

        let aborted = abort.load(Ordering::SeqCst);
        let summary = GroupSummary::from_results(&results);

        self.render(|r| r.complete());
        self.render(|r| r.cleanup());
        self.emit(&ProgressEvent::RunCompleted {
            summary: summary.clone(),
            aborted,
        });

        info!(
            processed = summary.total,
            succeeded = summary.succeeded,
            warnings = summary.warnings,
            failed = summary.failed,
            aborted,
            "run finished"
        );

        RunReport {
            run_id,
            results,
            summary,
            groups,
            tree,
            excluded,
            aborted,
            render_errors: self.render_errors(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_batch<A: Analyzer>(
        &self,
        files: &[PathBuf],
        offset: usize,
        analyzer: &A,
        executor: &ResilientExecutor,
        mode: ExecutionMode,
        continue_on_error: bool,
        abort: &AtomicBool,
    ) -> Vec<ProcessingResult<A::Output>> {
        match mode {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(files.len());
                for (i, file) in files.iter().enumerate() {
                    if abort.load(Ordering::SeqCst) {
                        break;
                    }
                    let result = self
                        .process_file(file, offset + i, analyzer, executor)
                        .await;
                    if !result.success && !continue_on_error {
                        warn!(file = %file.display(), "stopping after failure (strict mode)");
                        abort.store(true, Ordering::SeqCst);
                    }
                    results.push(result);
                }
                results
            }
            ExecutionMode::Concurrent => {
                let tasks = files.iter().enumerate().map(|(i, file)| async move {
                    let _permit = match self.gate.acquire().await {
                        Ok(permit) => permit,
                        Err(closed) => return Some(self.reject(file, closed)),
                    };
                    // Files still waiting for a slot are dropped once strict mode trips
                    if abort.load(Ordering::SeqCst) {
                        return None;
                    }

                    let result = self
                        .process_file(file, offset + i, analyzer, executor)
                        .await;
                    if !result.success && !continue_on_error {
                        warn!(file = %file.display(), "stopping after failure (strict mode)");
                        abort.store(true, Ordering::SeqCst);
                    }
                    Some(result)
                });

                join_all(tasks).await.into_iter().flatten().collect()
            }
        }
    }

    async fn process_file<A: Analyzer>(
        &self,
        file: &Path,
        index: usize,
        analyzer: &A,
        executor: &ResilientExecutor,
    ) -> ProcessingResult<A::Output> {
        self.emit(&ProgressEvent::FileStarted {
            file: file.to_path_buf(),
            index,
        });
        let (completed, total) = {
            let mut state = self.state.lock();
            state.update_status(file, FileStatus::Processing);
            (state.completed_files(), state.total_files())
        };
        self.render(|r| r.update_progress(Some(file), completed, total));

        let started_at = Utc::now();
        let clock = Instant::now();
        let attempts = AtomicU32::new(0);
        let timeout = self.timeout;

        let outcome = executor
            .execute_observed(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    analyze_once(analyzer, file, timeout)
                },
                |notice| {
                    self.emit(&ProgressEvent::FileRetrying {
                        file: file.to_path_buf(),
                        attempt: notice.attempt,
                        delay: notice.delay,
                        error: format!("{:#}", notice.error),
                    })
                },
            )
            .await;

        let duration = clock.elapsed();
        let attempts = attempts.load(Ordering::SeqCst);

        let result = match outcome {
            Ok(outcome) => ProcessingResult::succeeded(
                file.to_path_buf(),
                outcome.value,
                outcome.warning,
                attempts,
                started_at,
                duration,
            ),
            Err(error) => ProcessingResult::failed(
                file.to_path_buf(),
                failure_message(&error),
                FailureKind::from(&error),
                attempts,
                started_at,
                duration,
            ),
        };

        self.finish(&result);
        result
    }

    fn reject<T>(&self, file: &Path, closed: GateClosed) -> ProcessingResult<T> {
        let result = ProcessingResult::failed(
            file.to_path_buf(),
            closed.to_string(),
            FailureKind::GateClosed,
            0,
            Utc::now(),
            Duration::ZERO,
        );
        self.finish(&result);
        result
    }

    /// Record a terminal result in the state, the renderer and the observers
    fn finish<T>(&self, result: &ProcessingResult<T>) {
        let file = result.file.as_path();

        let (newly_finished, completed, total) = {
            let mut state = self.state.lock();
            if let Some(error) = &result.error {
                state.record_error(file, error.clone());
            } else if let Some(warning) = &result.warning {
                state.record_warning(file, warning.clone());
            }
            let newly_finished = state.update_status(file, result.status);
            (newly_finished, state.completed_files(), state.total_files())
        };

        if newly_finished {
            FILES_PROCESSED
                .with_label_values(&[result.status.as_str()])
                .inc();
            FILE_DURATION.observe(result.duration.as_secs_f64());
        }

        self.render(|r| r.update_file_status(file, result.status));
        if let Some(error) = &result.error {
            self.render(|r| r.error(file, error));
        }
        self.render(|r| r.update_progress(None, completed, total));

        self.emit(&ProgressEvent::FileFinished {
            file: file.to_path_buf(),
            status: result.status,
            duration: result.duration,
            message: result.error.clone().or_else(|| result.warning.clone()),
        });

        match (&result.error, &result.warning) {
            (Some(error), _) => warn!(
                file = %file.display(),
                attempts = result.attempts,
                "file failed: {}",
                error
            ),
            (None, Some(warning)) => debug!(file = %file.display(), "file has warnings: {}", warning),
            (None, None) => debug!(
                file = %file.display(),
                duration_ms = result.duration.as_millis() as u64,
                "file done"
            ),
        }
    }

    fn render<F>(&self, call: F)
    where
        F: FnOnce(&mut RenderErrorGuard) -> Result<(), RenderError>,
    {
        let mut renderer = self.renderer.lock();
        if let Err(error) = call(&mut renderer) {
            debug!("render guard passed an error through: {}", error);
        }
    }

    fn emit(&self, event: &ProgressEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

async fn analyze_once<A: Analyzer>(
    analyzer: &A,
    file: &Path,
    timeout: Option<Duration>,
) -> anyhow::Result<AnalysisOutcome<A::Output>> {
    match timeout {
        None => analyzer.analyze(file).await,
        Some(limit) => match tokio::time::timeout(limit, analyzer.analyze(file)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptTimedOut {
                timeout_ms: limit.as_millis() as u64,
            }
            .into()),
        },
    }
}

fn failure_message(error: &RetryError) -> String {
    match error.last_error() {
        Some(last) => format!("{last:#}"),
        None => error.to_string(),
    }
}

/// Keep the first occurrence of every path
fn dedupe(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::with_capacity(files.len());
    let mut unique = Vec::with_capacity(files.len());
    for file in files {
        if seen.insert(file.as_path()) {
            unique.push(file.clone());
        } else {
            warn!(file = %file.display(), "ignoring duplicate input path");
        }
    }
    unique
}
