//! Error reporting to an external tracking service.
//!
//! # Responsibilities
//! - Turn a pipeline failure into a report enriched with the request and context
//! - Deliver it through a swappable sink (Sentry, or nothing)
//! - Make delivery outlive the response by registering it as deferred work
//!
//! # Design Decisions
//! - Only `user-agent` is copied from request headers; every query parameter is kept
//! - Sink failures are logged and counted, never propagated

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header;
use serde_json::Value;
use thiserror::Error;

use crate::config::Environment;
use crate::error::DispatchError;
use crate::http::request::header_str;
use crate::http::Request;
use crate::lifecycle::ExecutionContext;
use crate::observability::metrics;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Failure inside the reporting path itself.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid reporting destination: {0}")]
    InvalidDsn(String),

    #[error("report was dropped by the sink")]
    Dropped,

    #[error("report delivery failed: {0}")]
    Delivery(String),
}

/// What gets sent for one failed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    pub method: String,
    /// Absolute URL including the query string.
    pub url: String,
    pub user_agent: Option<String>,
    pub extras: BTreeMap<String, Value>,
}

impl ErrorReport {
    pub fn new(error: &DispatchError, request: &Request, ctx: &ExecutionContext) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            method: request.method().to_string(),
            url: absolute_url(request),
            user_agent: header_str(request, header::USER_AGENT).map(str::to_string),
            extras: ctx.extras(),
        }
    }
}

fn absolute_url(request: &Request) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let host = header_str(request, header::HOST).unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("http://{host}{path}")
}

/// Destination for error reports.
pub trait ErrorSink: Send + Sync {
    /// Submit `report`. Delivery that needs to outlive the request goes through `ctx.wait_until`.
    fn capture(&self, report: &ErrorReport, ctx: &ExecutionContext) -> Result<(), ReportError>;
}

/// Sink used when no destination is configured.
#[derive(Debug, Default)]
pub struct NoopSink;

impl ErrorSink for NoopSink {
    fn capture(&self, report: &ErrorReport, _ctx: &ExecutionContext) -> Result<(), ReportError> {
        tracing::debug!(kind = report.kind, "Error reporting disabled, dropping report");
        Ok(())
    }
}

/// Sends reports to Sentry.
pub struct SentrySink {
    client: Arc<sentry::Client>,
}

impl SentrySink {
    pub fn new(dsn: &str, env: &Environment) -> Result<Self, ReportError> {
        let dsn = dsn
            .parse::<sentry::types::Dsn>()
            .map_err(|e| ReportError::InvalidDsn(e.to_string()))?;
        let environment = if env.is_local { "development" } else { "production" };
        let options = sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            environment: Some(Cow::Borrowed(environment)),
            ..Default::default()
        };
        Ok(Self {
            client: Arc::new(sentry::Client::with_options(options)),
        })
    }

    fn event(report: &ErrorReport) -> sentry::protocol::Event<'static> {
        let mut headers = BTreeMap::new();
        if let Some(ua) = &report.user_agent {
            headers.insert("user-agent".to_string(), ua.clone());
        }
        let url = url::Url::parse(&report.url).ok();
        let query_string = url.as_ref().and_then(|u| u.query()).map(str::to_string);

        sentry::protocol::Event {
            level: sentry::Level::Error,
            message: Some(report.message.clone()),
            exception: vec![sentry::protocol::Exception {
                ty: report.kind.to_string(),
                value: Some(report.message.clone()),
                ..Default::default()
            }]
            .into(),
            request: Some(sentry::protocol::Request {
                url,
                method: Some(report.method.clone()),
                query_string,
                headers,
                ..Default::default()
            }),
            extra: report.extras.clone(),
            ..Default::default()
        }
    }
}

impl ErrorSink for SentrySink {
    fn capture(&self, report: &ErrorReport, ctx: &ExecutionContext) -> Result<(), ReportError> {
        let hub = sentry::Hub::new(
            Some(self.client.clone()),
            Arc::new(sentry::Scope::default()),
        );
        let event_id = hub.capture_event(Self::event(report));
        if event_id.is_nil() {
            return Err(ReportError::Dropped);
        }

        let client = self.client.clone();
        ctx.wait_until(async move {
            match tokio::task::spawn_blocking(move || client.flush(Some(FLUSH_TIMEOUT))).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!("Error report flush timed out"),
                Err(e) => tracing::warn!(error = %e, "Error report flush task failed"),
            }
        });
        Ok(())
    }
}

/// Pick the sink described by an environment.
///
/// An unusable DSN disables reporting rather than failing startup.
pub fn sink_from_env(env: &Environment) -> Arc<dyn ErrorSink> {
    match env.sentry_dsn.as_deref() {
        Some(dsn) => match SentrySink::new(dsn, env) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                tracing::error!(error = %e, "Error reporting disabled");
                Arc::new(NoopSink)
            }
        },
        None => Arc::new(NoopSink),
    }
}

/// Error-tracking client bound to one request and its context.
pub struct ErrorReporter<'a> {
    sink: Arc<dyn ErrorSink>,
    request: &'a Request,
    ctx: &'a ExecutionContext,
}

impl<'a> ErrorReporter<'a> {
    pub fn new(sink: Arc<dyn ErrorSink>, request: &'a Request, ctx: &'a ExecutionContext) -> Self {
        Self { sink, request, ctx }
    }

    /// Report `error`. Never fails: sink errors are logged and swallowed.
    pub fn capture(&self, error: &DispatchError) {
        let report = ErrorReport::new(error, self.request, self.ctx);
        if let Err(e) = self.sink.capture(&report, self.ctx) {
            metrics::record_report_failure();
            tracing::warn!(error = %e, kind = report.kind, "Failed to submit error report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<ErrorReport>>);

    impl ErrorSink for Recording {
        fn capture(&self, report: &ErrorReport, _ctx: &ExecutionContext) -> Result<(), ReportError> {
            self.0.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    struct Broken;

    impl ErrorSink for Broken {
        fn capture(&self, _report: &ErrorReport, _ctx: &ExecutionContext) -> Result<(), ReportError> {
            Err(ReportError::Delivery("connection refused".to_string()))
        }
    }

    fn request() -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/r/abc/restore?ts=1700000000&debug=1")
            .header(header::HOST, "rooms.example.com")
            .header(header::USER_AGENT, "test-agent/1.0")
            .header(header::COOKIE, "session=secret")
            .body(Bytes::new())
            .unwrap()
    }

    #[test]
    fn test_report_contents() {
        let ctx = ExecutionContext::new();
        ctx.set_extra("roomId", Value::from("abc"));
        let report = ErrorReport::new(&DispatchError::handler("restore", "boom"), &request(), &ctx);

        assert_eq!(report.kind, "handler");
        assert_eq!(report.method, "POST");
        assert_eq!(
            report.url,
            "http://rooms.example.com/r/abc/restore?ts=1700000000&debug=1"
        );
        assert_eq!(report.user_agent.as_deref(), Some("test-agent/1.0"));
        assert_eq!(report.extras.get("roomId"), Some(&Value::from("abc")));
    }

    #[test]
    fn test_sentry_event_keeps_only_user_agent() {
        let ctx = ExecutionContext::new();
        let report = ErrorReport::new(&DispatchError::Backend("down".into()), &request(), &ctx);
        let event = SentrySink::event(&report);
        let req = event.request.unwrap();
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.headers.get("user-agent").map(String::as_str), Some("test-agent/1.0"));
        assert_eq!(req.query_string.as_deref(), Some("ts=1700000000&debug=1"));
        assert!(req.cookies.is_none());
    }

    #[test]
    fn test_reporter_uses_sink() {
        let sink = Arc::new(Recording::default());
        let req = request();
        let ctx = ExecutionContext::new();
        let reporter = ErrorReporter::new(sink.clone(), &req, &ctx);
        reporter.capture(&DispatchError::Internal("x".into()));
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reporter_swallows_sink_failure() {
        let req = request();
        let ctx = ExecutionContext::new();
        let reporter = ErrorReporter::new(Arc::new(Broken), &req, &ctx);
        reporter.capture(&DispatchError::Internal("x".into()));
    }

    #[test]
    fn test_invalid_dsn_falls_back_to_noop() {
        let env = Environment {
            sentry_dsn: Some("not a dsn".to_string()),
            ..Environment::default()
        };
        assert!(SentrySink::new("not a dsn", &env).is_err());
        let sink = sink_from_env(&env);
        let req = request();
        let ctx = ExecutionContext::new();
        let report = ErrorReport::new(&DispatchError::Internal("x".into()), &req, &ctx);
        assert!(sink.capture(&report, &ctx).is_ok());
    }
}
