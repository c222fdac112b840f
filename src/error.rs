//! Error types shared by the request pipeline.
//!
//! Only failures that should reach the error boundary are modelled here.
//! Rejected origins and unknown routes are ordinary responses, not errors.

use thiserror::Error;

/// A failure while routing or handling a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The room backend could not be reached or answered with garbage.
    #[error("room backend error: {0}")]
    Backend(String),

    /// The request could not be turned into a backend request.
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// A route handler failed.
    #[error("handler `{handler}` failed: {message}")]
    Handler {
        handler: &'static str,
        message: String,
    },

    /// Routing and handling did not finish within the request deadline.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A route handler panicked.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// Invariant violation inside the gateway itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Convenience constructor for handler failures.
    pub fn handler(handler: &'static str, message: impl Into<String>) -> Self {
        DispatchError::Handler {
            handler,
            message: message.into(),
        }
    }

    /// Short label for metrics and error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Backend(_) => "backend",
            DispatchError::BadRequest(_) => "bad_request",
            DispatchError::Handler { .. } => "handler",
            DispatchError::Timeout(_) => "timeout",
            DispatchError::Panic(_) => "panic",
            DispatchError::Internal(_) => "internal",
        }
    }
}

impl From<axum::http::Error> for DispatchError {
    fn from(err: axum::http::Error) -> Self {
        DispatchError::BadRequest(err.to_string())
    }
}

/// Result alias used throughout the pipeline.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
