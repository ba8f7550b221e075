use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use reviewpipe::processing::{AnalysisOutcome, Analyzer};
use reviewpipe::retry::FailureHint;

/// What a scripted file does on each call
#[derive(Debug, Clone)]
pub enum Script {
    Ok,
    Warn(&'static str),
    /// Fail with a retryable error this many times, then succeed
    FlakyThenOk(usize),
    AlwaysTransient,
    Permanent,
    /// Sleep before succeeding
    Slow(Duration),
}

/// Analyzer whose behavior per file is scripted up front.
///
/// Files without a script succeed. Every call is counted per file, and the
/// peak number of concurrent calls is tracked.
#[derive(Clone, Default)]
pub struct ScriptedAnalyzer {
    scripts: Arc<HashMap<PathBuf, Script>>,
    calls: Arc<Mutex<HashMap<PathBuf, usize>>>,
    order: Arc<Mutex<Vec<PathBuf>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedAnalyzer {
    pub fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: Arc::new(
                scripts
                    .iter()
                    .map(|(file, script)| (PathBuf::from(file), script.clone()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn calls(&self, file: impl AsRef<Path>) -> usize {
        self.calls.lock().get(file.as_ref()).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Files in the order their first call started
    pub fn call_order(&self) -> Vec<PathBuf> {
        self.order.lock().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    type Output = String;

    async fn analyze(&self, file: &Path) -> anyhow::Result<AnalysisOutcome<String>> {
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(file.to_path_buf()).or_insert(0);
            *count += 1;
            if *count == 1 {
                self.order.lock().push(file.to_path_buf());
            }
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let script = self.scripts.get(file).cloned().unwrap_or(Script::Ok);
        if let Script::Slow(delay) = script {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let name = file.display().to_string();
        match script {
            Script::Ok | Script::Slow(_) => Ok(AnalysisOutcome::ok(name)),
            Script::Warn(message) => Ok(AnalysisOutcome::with_warning(name, message)),
            Script::FlakyThenOk(failures) if call <= failures => {
                Err(anyhow!("503 service unavailable"))
            }
            Script::FlakyThenOk(_) => Ok(AnalysisOutcome::ok(name)),
            Script::AlwaysTransient => Err(anyhow!("connection reset by peer")),
            Script::Permanent => Err(FailureHint::permanent("401 unauthorized")),
        }
    }
}
