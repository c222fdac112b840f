//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body buffering, per-request context)
//!     → dispatcher.rs (error boundary, route table, CORS reconciliation)
//!     → response.rs (fixed gateway responses)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{Dispatcher, Gateway};
pub use request::Request;
pub use response::Response;
pub use server::HttpServer;
