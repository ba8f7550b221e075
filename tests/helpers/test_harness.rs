use std::path::{Path, PathBuf};

use anyhow::Result;
use reviewpipe::progress::{ProgressRenderer, RenderErrorGuard, SilentRenderer};
use reviewpipe::retry::RetryConfig;
use reviewpipe::{Config, ProcessingOrchestrator};
use tempfile::TempDir;

pub struct TestHarness {
    pub temp_dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    /// Temp directory plus a config with millisecond backoff and no breaker
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let mut config = Config::default();
        config.retry = fast_retry(3);
        config.circuit_breaker.enabled = false;

        Ok(Self { temp_dir, config })
    }

    pub fn create_test_file(&self, path: &str, content: &str) -> Result<PathBuf> {
        let file_path = self.temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, content)?;
        Ok(file_path)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn orchestrator(&self) -> ProcessingOrchestrator {
        self.orchestrator_with(RenderErrorGuard::without_fallback(Box::new(SilentRenderer), 3))
    }

    pub fn orchestrator_with(&self, guard: RenderErrorGuard) -> ProcessingOrchestrator {
        ProcessingOrchestrator::from_config(&self.config, guard)
            .expect("test config is valid")
    }

    pub fn guarded(renderer: impl ProgressRenderer + 'static) -> RenderErrorGuard {
        RenderErrorGuard::without_fallback(Box::new(renderer), 3)
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay_ms: 1,
        max_delay_ms: 4,
        backoff_multiplier: 2.0,
        jitter_ms: 0,
    }
}

pub fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}
