//! Request representation used by the pipeline.
//!
//! # Responsibilities
//! - Buffer the inbound body so the request is immutable and cheap to share
//! - Read single-valued headers without panicking on non-UTF-8 values
//!
//! # Design Decisions
//! - Bodies are bounded by `listener.max_body_bytes`; larger bodies are rejected with 413
//! - The same `Request` value is seen by middleware, handlers and error reports

use axum::body::Body;
use axum::http::header::HeaderName;
use bytes::Bytes;
use http_body_util::LengthLimitError;

/// A fully buffered inbound request.
pub type Request = axum::http::Request<Bytes>;

/// `sec-fetch-site` fetch metadata header.
pub const SEC_FETCH_SITE: HeaderName = HeaderName::from_static("sec-fetch-site");

/// A request whose body could not be read.
///
/// Keeps the head (with an empty body) so the rejection can still be answered
/// with the usual response headers.
#[derive(Debug)]
pub struct UnreadBody {
    pub request: Request,
    pub error: axum::Error,
}

impl UnreadBody {
    /// The body exceeded the configured limit.
    pub fn is_too_large(&self) -> bool {
        std::error::Error::source(&self.error)
            .is_some_and(|e| e.is::<LengthLimitError>())
    }
}

/// Buffer the body of a streaming request, failing once `limit` bytes are exceeded.
pub async fn buffer_request(
    request: axum::http::Request<Body>,
    limit: usize,
) -> Result<Request, UnreadBody> {
    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => Ok(Request::from_parts(parts, bytes)),
        Err(error) => Err(UnreadBody {
            request: Request::from_parts(parts, Bytes::new()),
            error,
        }),
    }
}

/// First value of `name` as a string, if present and valid UTF-8.
pub fn header_str<'a, K>(request: &'a Request, name: K) -> Option<&'a str>
where
    K: axum::http::header::AsHeaderName,
{
    request.headers().get(name).and_then(|v| v.to_str().ok())
}
