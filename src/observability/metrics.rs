//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fold_requests_total` (counter): dispatched requests by method, status, outcome
//! - `fold_request_duration_seconds` (histogram): time from match to last entry returning
//! - `fold_http_requests_total` (counter): requests seen by the HTTP host, by status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one pass through the dispatcher.
pub fn record_dispatch(method: &str, status: u16, outcome: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!("fold_requests_total", &labels).increment(1);
    histogram!("fold_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Record a request answered by the HTTP host.
pub fn record_http_request(status: u16) {
    counter!("fold_http_requests_total", "status" => status.to_string()).increment(1);
}
