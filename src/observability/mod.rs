//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Error boundary produces:
//!     → reporting.rs (one report per failed request, delivered as deferred work)
//! ```
//!
//! # Design Decisions
//! - Structured logging, filterable with RUST_LOG
//! - Metrics are cheap and always recorded; the exporter is optional
//! - Reporting is best-effort: a broken sink never changes a response

pub mod logging;
pub mod metrics;
pub mod reporting;

pub use reporting::{ErrorReport, ErrorReporter, ErrorSink, NoopSink, ReportError, SentrySink};
