//! Error boundary around routing and handler execution.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use axum::http::StatusCode;
use futures_util::FutureExt;

use crate::error::{DispatchError, DispatchResult};
use crate::http::{response, Response};
use crate::observability::metrics;
use crate::observability::ErrorReporter;

/// Body of every boundary-generated 500.
pub const INTERNAL_ERROR_BODY: &str = "Something went wrong";

/// Converts failures into a reported, generic 500.
pub struct ErrorBoundary;

impl ErrorBoundary {
    /// Drive `future` to completion.
    ///
    /// `Err` results and panics are logged, reported exactly once through
    /// `reporter`, and replaced by a generic 500 response.
    pub async fn catch<F, T>(future: F, reporter: &ErrorReporter<'_>) -> Result<T, Response>
    where
        F: Future<Output = DispatchResult<T>>,
    {
        let error = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => error,
            Err(panic) => DispatchError::Panic(panic_message(panic.as_ref())),
        };

        tracing::error!(error = %error, kind = error.kind(), "Unhandled failure while dispatching");
        metrics::record_handler_failure(error.kind());
        reporter.capture(&error);

        Err(Self::internal_error())
    }

    /// The fixed response sent in place of any failure.
    pub fn internal_error() -> Response {
        response::text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
