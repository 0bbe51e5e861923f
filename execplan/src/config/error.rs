use std::path::PathBuf;
use thiserror::Error;

/// Failures while layering `execplan.toml` and `EXECPLAN_*` overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load ExecPlan configuration: {0}")]
    LoadError(String),

    #[error("ExecPlan config file not found: {0}")]
    FileNotFound(PathBuf),

    /// Built-in defaults could not be seeded into the layer stack.
    #[error("Failed to encode default configuration: {0}")]
    ParseError(String),

    #[error("Invalid ExecPlan configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
