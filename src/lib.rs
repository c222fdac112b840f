//! Front-door request dispatcher for a collaborative-room backend.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod rooms;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::{Gateway, HttpServer};
pub use lifecycle::Shutdown;
