//! Layered configuration: built-in defaults, an optional TOML file and
//! `PLATE_GATE__*` environment variables, in increasing priority.

use std::path::PathBuf;
use std::time::Duration;

use alpr::{SelectionPolicy, SelectionStrategy};
use config::{Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "plate_gate.toml";
/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_VAR: &str = "PLATE_GATE_CONFIG";
const ENV_PREFIX: &str = "PLATE_GATE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub staging_path: PathBuf,
    pub upload_dir: PathBuf,
    pub log_level: String,
    pub camera: CameraConfig,
    pub recognition: RecognitionConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// HTTP endpoint returning one still image per request.
    pub snapshot_url: String,
    pub frame_interval_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    pub sample_interval_secs: u64,
    pub program: String,
    pub args: Vec<String>,
    pub strategy: SelectionStrategy,
    pub min_confidence: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub poll_timeout_secs: u64,
    /// Operator chat receiving alerts for denied plates.
    pub alert_chat_id: Option<i64>,
}

impl Config {
    /// Load from the file named by `PLATE_GATE_CONFIG`, or
    /// `plate_gate.toml` in the working directory when present.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::from_file(&path)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config: Config = config::Config::builder()
            .set_default("bind_addr", "127.0.0.1:5000")?
            .set_default("database_url", "sqlite://database.db")?
            .set_default("staging_path", "car_data.json")?
            .set_default("upload_dir", "static/uploads")?
            .set_default("log_level", "info")?
            .set_default("camera.snapshot_url", "http://127.0.0.1:8080/snapshot.jpg")?
            .set_default("camera.frame_interval_ms", 100)?
            .set_default("camera.timeout_secs", 5)?
            .set_default("recognition.sample_interval_secs", 10)?
            .set_default("recognition.program", "alpr")?
            .set_default("recognition.args", vec!["-j", alpr::IMAGE_PLACEHOLDER])?
            .set_default("recognition.strategy", "first_candidate")?
            .set_default("telegram.api_url", telegram::DEFAULT_API_URL)?
            .set_default("telegram.poll_timeout_secs", 30)?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("recognition.args")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("camera.frame_interval_ms must be positive".into()));
        }
        if self.recognition.program.trim().is_empty() {
            return Err(ConfigError::Invalid("recognition.program is empty".into()));
        }
        Ok(())
    }
}

impl CameraConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RecognitionConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            strategy: self.strategy,
            min_confidence: self.min_confidence,
        }
    }
}
