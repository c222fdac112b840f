//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Routing + handler execution:
//!     → boundary.rs (catch Err and panics, report once, answer 500)
//! ```
//!
//! # Design Decisions
//! - Failures are caught once, at the outermost layer, and never re-thrown
//! - No retries here; the room backend owns retry policy
//! - Internal error text never reaches the caller

pub mod boundary;

pub use boundary::{ErrorBoundary, INTERNAL_ERROR_BODY};
