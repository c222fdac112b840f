//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the room gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Per-request environment handed to every route.
    pub environment: Environment,

    /// Cross-origin response policy.
    pub cors: CorsConfig,

    /// Room backend the routes forward to.
    pub rooms: RoomsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8787").
    pub bind_address: String,

    /// Maximum buffered request body in bytes.
    pub max_body_bytes: usize,

    /// Deadline for routing and handling one request, in seconds. Reloadable.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8787".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Named configuration values visible to the pipeline and every handler.
///
/// Read-only for the duration of a request. The server hands each request its
/// own `Arc` snapshot, so a hot reload never changes it mid-flight.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Environment {
    /// Local development mode. Disables origin enforcement.
    pub is_local: bool,

    /// Error-reporting destination. Reporting is disabled when unset.
    pub sentry_dsn: Option<String>,

    /// Exact origins allowed to call the gateway. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,

    /// Regular expressions matched against the Origin header.
    pub allowed_origin_patterns: Vec<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            is_local: false,
            sentry_dsn: None,
            allowed_origins: vec!["*".to_string()],
            allowed_origin_patterns: Vec::new(),
        }
    }
}

/// Cross-origin header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Methods advertised in `access-control-allow-methods`. OPTIONS is always added.
    pub allow_methods: Vec<String>,

    /// Headers advertised in `access-control-allow-headers`.
    pub allow_headers: Vec<String>,

    /// Headers advertised in `access-control-expose-headers`.
    pub expose_headers: Vec<String>,

    /// `access-control-max-age` in seconds.
    pub max_age_secs: u64,

    /// Emit `access-control-allow-credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_methods: vec!["GET".to_string(), "POST".to_string()],
            allow_headers: vec!["content-type".to_string()],
            expose_headers: Vec::new(),
            max_age_secs: 86_400,
            allow_credentials: false,
        }
    }
}

/// Room backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Base URL of the room backend (e.g., "http://127.0.0.1:8788").
    pub backend_url: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8788".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
