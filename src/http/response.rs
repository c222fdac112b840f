//! Response construction helpers.
//!
//! # Design Decisions
//! - Status text is always the canonical reason phrase for the status code
//! - Terminal responses produced by the gateway itself carry short, fixed bodies

use axum::body::Body;
use axum::http::StatusCode;

/// Outbound response type.
pub type Response = axum::response::Response;

/// A response with a fixed plain-text body.
pub fn text(status: StatusCode, body: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

/// A response with no body.
pub fn empty(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// Read a response body to bytes. Consumes the response.
pub async fn body_bytes(response: Response) -> Result<bytes::Bytes, axum::Error> {
    axum::body::to_bytes(response.into_body(), usize::MAX).await
}
