//! Capture metrics.
//!
//! # Metrics
//! - `httpnote_requests_captured_total` (counter): records emitted, by method
//! - `httpnote_body_capture_failures_total` (counter): bodies that could not be read
//! - `httpnote_form_parse_failures_total` (counter): forms that failed to parse

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_capture(method: &str) {
    metrics::counter!("httpnote_requests_captured_total", "method" => method.to_string()).increment(1);
}

pub fn record_body_capture_failure() {
    metrics::counter!("httpnote_body_capture_failures_total").increment(1);
}

pub fn record_form_parse_failure() {
    metrics::counter!("httpnote_form_parse_failures_total").increment(1);
}
