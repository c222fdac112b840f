//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, binding
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_origin_rejections_total` (counter): 403s by reason
//! - `gateway_handler_failures_total` (counter): failures caught by the error boundary
//! - `gateway_reports_failed_total` (counter): error reports the sink could not take

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, binding: &'static str, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "binding" => binding,
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_origin_rejection(reason: &'static str) {
    ::metrics::counter!("gateway_origin_rejections_total", "reason" => reason).increment(1);
}

pub fn record_handler_failure(kind: &'static str) {
    ::metrics::counter!("gateway_handler_failures_total", "kind" => kind).increment(1);
}

pub fn record_report_failure() {
    ::metrics::counter!("gateway_reports_failed_total").increment(1);
}
