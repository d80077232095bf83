use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub media: MediaConfig,
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub extraction: ExtractionConfig,
    pub services: ServicesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the daily-rolling JSON log file
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Env-filter directive applied on top of RUST_LOG
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_filter() -> String {
    "foodreel=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Root directory for scoped per-video media artifacts
    pub root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Permits for the extraction worker pool. Transcription and text
    /// detection are model-bound, so this stays small.
    pub workers: usize,
    /// Deadline for both extraction branches together, in seconds.
    pub deadline_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub transcription_url: String,
    pub detection_url: String,
    pub model_url: String,
    pub model_name: String,
    pub places_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}
