//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Per request (context.rs):
//!     ExecutionContext created → handlers register deferred work → response sent
//!     → DeferredTracker settles the context in the background
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → stop accepting → drain deferred work (bounded) → exit
//! ```
//!
//! # Design Decisions
//! - Deferred work is never dropped silently on shutdown; it is drained with a deadline
//! - Contexts are per request; only the tracker outlives a request

pub mod context;
pub mod shutdown;
pub mod signals;

pub use context::{DeferredTracker, ExecutionContext};
pub use shutdown::Shutdown;
