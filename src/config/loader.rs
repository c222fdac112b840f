//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Process environment overrides are applied before validation.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Built-in defaults with process environment overrides, for running without a file.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    parse_config("", |key| std::env::var(key).ok())
}

/// Parse, override and validate configuration text.
///
/// `lookup` resolves environment variables; tests pass a closure instead of
/// touching the real process environment.
pub fn parse_config<F>(content: &str, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: GatewayConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `IS_LOCAL`, `SENTRY_DSN` and `ROOM_GATEWAY_BIND` on top of file values.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("IS_LOCAL") {
        config.environment.is_local = value == "true";
    }
    if let Some(dsn) = lookup("SENTRY_DSN") {
        config.environment.sentry_dsn = if dsn.is_empty() { None } else { Some(dsn) };
    }
    if let Some(bind) = lookup("ROOM_GATEWAY_BIND") {
        config.listener.bind_address = bind;
    }
}
