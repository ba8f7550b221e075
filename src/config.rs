use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::grouping::{GroupBy, GroupSort};
use crate::processing::ExecutionMode;
use crate::progress::ProgressMode;
use crate::retry::{CircuitBreakerConfig, RetryConfig};

const CONFIG_DIR: &str = ".reviewpipe";
const CONFIG_FILE: &str = "config.toml";

/// Invalid configuration detected while constructing a component.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub grouping: GroupingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Execution mode: "sequential" (default) or "concurrent"
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Maximum number of analysis calls in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Keep going after a file fails (strict mode when false)
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,

    /// Optional per-attempt timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_concurrency: default_max_concurrency(),
            continue_on_error: default_continue_on_error(),
            timeout_ms: None,
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid(
                "processing.max_concurrency",
                "must be at least 1",
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "processing.timeout_ms",
                "must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

fn default_max_concurrency() -> usize {
    3
}

fn default_continue_on_error() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Renderer selection: auto, interactive, plain, minimal or silent
    #[serde(default)]
    pub mode: ProgressMode,

    /// Minimum interval between two progress lines
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Renderer failures tolerated before switching to the fallback
    #[serde(default = "default_max_render_errors")]
    pub max_render_errors: usize,

    /// Renderer used after the primary one is abandoned
    #[serde(default = "default_fallback_mode")]
    pub fallback: ProgressMode,

    /// Force unicode symbols on or off (None = detect)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode: Option<bool>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mode: ProgressMode::default(),
            throttle_ms: default_throttle_ms(),
            max_render_errors: default_max_render_errors(),
            fallback: default_fallback_mode(),
            unicode: None,
        }
    }
}

impl ProgressConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_render_errors == 0 {
            return Err(ConfigError::invalid(
                "progress.max_render_errors",
                "must be at least 1",
            ));
        }
        if matches!(self.fallback, ProgressMode::Auto | ProgressMode::Interactive) {
            return Err(ConfigError::invalid(
                "progress.fallback",
                "fallback renderer must be plain, minimal or silent",
            ));
        }
        Ok(())
    }
}

fn default_throttle_ms() -> u64 {
    100
}

fn default_max_render_errors() -> usize {
    3
}

fn default_fallback_mode() -> ProgressMode {
    ProgressMode::Plain
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Grouping criterion: none (default), directory or filetype
    #[serde(default)]
    pub by: GroupBy,

    /// Group order: alphabetical (default), file-count or depth
    #[serde(default)]
    pub sort: GroupSort,

    /// Only keep groups matching one of these keys (prefix match)
    #[serde(default)]
    pub include: Vec<String>,

    /// Drop groups matching one of these keys (prefix match)
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Line cap per diff chunk
    #[serde(default = "default_max_lines_per_chunk")]
    pub max_lines_per_chunk: usize,

    /// Byte cap per diff chunk
    #[serde(default = "default_max_bytes_per_chunk")]
    pub max_bytes_per_chunk: usize,

    /// Lines of surrounding context attached to each chunk
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// Chunks analysed at once
    #[serde(default = "default_chunk_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_lines_per_chunk: default_max_lines_per_chunk(),
            max_bytes_per_chunk: default_max_bytes_per_chunk(),
            context_lines: default_context_lines(),
            max_concurrency: default_chunk_concurrency(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lines_per_chunk == 0 {
            return Err(ConfigError::invalid(
                "chunking.max_lines_per_chunk",
                "must be at least 1",
            ));
        }
        if self.max_bytes_per_chunk == 0 {
            return Err(ConfigError::invalid(
                "chunking.max_bytes_per_chunk",
                "must be at least 1",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid(
                "chunking.max_concurrency",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_max_lines_per_chunk() -> usize {
    200
}

fn default_max_bytes_per_chunk() -> usize {
    32 * 1024
}

fn default_context_lines() -> usize {
    3
}

fn default_chunk_concurrency() -> usize {
    num_cpus::get().clamp(1, 8)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write logs to rolling files
    #[serde(default)]
    pub enabled: bool,

    /// Also log to stderr (filtered by RUST_LOG)
    #[serde(default = "default_log_stderr")]
    pub stderr: bool,

    /// File log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log directory, relative paths resolve against the project root
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// hourly, daily, minutely or never
    #[serde(default = "default_log_rotation")]
    pub rotation: String,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            stderr: default_log_stderr(),
            level: default_log_level(),
            directory: default_log_directory(),
            rotation: default_log_rotation(),
            file_prefix: default_log_file_prefix(),
        }
    }
}

fn default_log_stderr() -> bool {
    true
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("logs")
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

fn default_log_file_prefix() -> String {
    "reviewpipe.log".to_string()
}

impl Config {
    /// Load configuration from the .reviewpipe directory
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))?;
            config
                .validate()
                .with_context(|| format!("Invalid config in {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the .reviewpipe directory
    pub fn save(&self, root: &Path) -> Result<()> {
        let config_dir = root.join(CONFIG_DIR);
        let config_path = config_dir.join(CONFIG_FILE);

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Check every section, stopping at the first invalid value
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.processing.validate()?;
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.progress.validate()?;
        self.chunking.validate()?;
        Ok(())
    }

    /// Get the path to the .reviewpipe directory
    pub fn config_dir(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR)
    }

    /// Check if a config file exists in the given directory
    pub fn is_initialized(root: &Path) -> bool {
        Self::config_dir(root).join(CONFIG_FILE).exists()
    }
}
