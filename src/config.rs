//! Configuration management for the fraud shield

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "FRAUD_SHIELD_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
    pub nats: NatsConfig,
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on
    pub listen_addr: String,
}

/// Trained artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing model and preprocessing artifacts
    pub models_dir: String,
    /// Supervised classifier ONNX file (optional at runtime)
    #[serde(default = "default_supervised_file")]
    pub supervised_file: String,
    /// Unsupervised outlier detector ONNX file (optional at runtime)
    #[serde(default = "default_unsupervised_file")]
    pub unsupervised_file: String,
    /// Scaler + encoder artifact (required)
    #[serde(default = "default_preprocessing_file")]
    pub preprocessing_file: String,
    /// Number of threads for ONNX inference per model
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Fraud probability cut-off when the classifier exposes no label
    #[serde(default = "default_supervised_threshold")]
    pub supervised_threshold: f64,
}

fn default_supervised_file() -> String {
    "fraud_model_xgboost.onnx".to_string()
}

fn default_unsupervised_file() -> String {
    "fraud_model_iso_forest.onnx".to_string()
}

fn default_preprocessing_file() -> String {
    "preprocessing.json".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

fn default_supervised_threshold() -> f64 {
    0.5
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for assembly + inference in milliseconds
    pub timeout_ms: u64,
    /// Per-observer queue depth
    pub observer_buffer: usize,
    /// Maximum transactions processed concurrently from NATS
    pub max_inflight: usize,
}

/// NATS bridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// Whether to connect to NATS at all
    #[serde(default)]
    pub enabled: bool,
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject for outgoing broadcast payloads
    pub verdict_subject: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `FRAUD_SHIELD_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, overlaid with
    /// `FRAUD_SHIELD__SECTION__KEY` environment variables
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("FRAUD_SHIELD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Full path of an artifact inside the models directory
    pub fn model_path(&self, file: &str) -> std::path::PathBuf {
        Path::new(&self.models.models_dir).join(file)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "127.0.0.1:8000".to_string(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                supervised_file: default_supervised_file(),
                unsupervised_file: default_unsupervised_file(),
                preprocessing_file: default_preprocessing_file(),
                onnx_threads: default_onnx_threads(),
                supervised_threshold: default_supervised_threshold(),
            },
            pipeline: PipelineConfig {
                timeout_ms: 1000,
                observer_buffer: 64,
                max_inflight: 4,
            },
            nats: NatsConfig {
                enabled: false,
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                verdict_subject: "fraud.verdicts".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
