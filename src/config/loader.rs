//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    Env { var: String, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` when given (defaults otherwise), overlay `<prefix>_*`
/// environment variables, then validate the result.
pub fn load_or_default(path: Option<&Path>, prefix: &str) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, prefix)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(path = ?path, prefix, "Configuration loaded");
    Ok(config)
}

/// Overlay `<prefix>_HTTP_PORT`, `<prefix>_GRPC_PORT`, `<prefix>_LOG_LEVEL`
/// and `<prefix>_SHUTDOWN_TIMEOUT_MS` from the process environment.
pub fn apply_env_overrides(config: &mut ServiceConfig, prefix: &str) -> Result<(), ConfigError> {
    apply_overrides_with(config, prefix, |key| std::env::var(key).ok())
}

fn apply_overrides_with<F>(
    config: &mut ServiceConfig,
    prefix: &str,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = |suffix: &str| format!("{}_{}", prefix, suffix);

    if let Some(port) = lookup(&key("HTTP_PORT")) {
        config.http.port = port;
    }
    if let Some(port) = lookup(&key("GRPC_PORT")) {
        config.grpc.port = port;
    }
    if let Some(level) = lookup(&key("LOG_LEVEL")) {
        config.observability.log_level = level;
    }

    let var = key("SHUTDOWN_TIMEOUT_MS");
    if let Some(value) = lookup(&var) {
        config.shutdown.timeout_ms = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
    }

    Ok(())
}
