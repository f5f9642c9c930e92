//! Configuration management

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub sandbox: SandboxConfig,
    pub logging: LoggingConfig,
}

/// Workflow engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default whole-workflow deadline in milliseconds, used when a
    /// definition does not declare its own
    pub default_timeout_ms: u64,
    /// Whether runs persist a checkpoint after every barrier group
    pub enable_checkpointing: bool,
    /// Directory for file-backed checkpoints; in-memory when unset
    pub checkpoint_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 300_000,
            enable_checkpointing: false,
            checkpoint_dir: None,
        }
    }
}

/// Sandbox resource configuration
///
/// Converted into per-dispatch budgets by the sandbox crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Per-plugin execution timeout in milliseconds
    pub timeout_ms: u64,
    /// Per-plugin memory ceiling in bytes (best-effort supervision)
    pub max_memory_bytes: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_memory_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (overridable via `SONDE_LOG`)
    pub level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from `SONDE_CONFIG` (or `./sonde.toml`), falling
    /// back to defaults when no file exists. A handful of environment
    /// variables override individual fields afterwards.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SONDE_CONFIG").unwrap_or_else(|_| "sonde.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            Self::load_from_path(&path)?
        } else {
            Self::default()
        };

        if let Ok(level) = std::env::var("SONDE_LOG") {
            config.logging.level = level;
        }
        if let Some(ms) = env_u64("SONDE_SANDBOX_TIMEOUT_MS") {
            config.sandbox.timeout_ms = ms;
        }
        if let Some(ms) = env_u64("SONDE_WORKFLOW_TIMEOUT_MS") {
            config.engine.default_timeout_ms = ms;
        }

        Ok(config)
    }

    /// Load configuration from an explicit TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Initialize the global tracing subscriber from logging config.
///
/// Safe to call more than once; later calls are no-ops (useful in tests).
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("SONDE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.sandbox.timeout_ms, 30_000);
        assert_eq!(config.sandbox.max_memory_bytes, 256 * 1024 * 1024);
        assert_eq!(config.engine.default_timeout_ms, 300_000);
        assert!(!config.engine.enable_checkpointing);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[sandbox]\ntimeout_ms = 5000").expect("write config");

        let config = Config::load_from_path(file.path()).expect("load should succeed");
        assert_eq!(config.sandbox.timeout_ms, 5_000);
        // Everything else stays at defaults
        assert_eq!(config.sandbox.max_memory_bytes, 256 * 1024 * 1024);
        assert_eq!(config.engine.default_timeout_ms, 300_000);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "not valid toml [[").expect("write config");

        let err = Config::load_from_path(file.path()).expect_err("parse must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
