//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limit > 0, timeouts > 0)
//! - Check that origin patterns compile and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use regex::Regex;
use url::Url;

use crate::config::schema::GatewayConfig;

const KNOWN_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "listener.max_body_bytes",
            "must be greater than zero",
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    let env = &config.environment;
    for origin in &env.allowed_origins {
        if origin.trim().is_empty() {
            errors.push(ValidationError::new(
                "environment.allowed_origins",
                "contains an empty origin",
            ));
        }
    }
    for pattern in &env.allowed_origin_patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::new(
                "environment.allowed_origin_patterns",
                format!("invalid pattern `{pattern}`: {e}"),
            ));
        }
    }

    for method in &config.cors.allow_methods {
        if !KNOWN_METHODS.contains(&method.to_uppercase().as_str()) {
            errors.push(ValidationError::new(
                "cors.allow_methods",
                format!("invalid HTTP method `{method}`"),
            ));
        }
    }
    if config.cors.allow_credentials && env.allowed_origins.iter().any(|o| o == "*") {
        errors.push(ValidationError::new(
            "cors.allow_credentials",
            "cannot be combined with allowed_origins = [\"*\"]",
        ));
    }

    match Url::parse(&config.rooms.backend_url) {
        Ok(url) if url.scheme() == "http" => {}
        Ok(url) => errors.push(ValidationError::new(
            "rooms.backend_url",
            format!("unsupported scheme `{}`", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "rooms.backend_url",
            format!("invalid URL: {e}"),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
