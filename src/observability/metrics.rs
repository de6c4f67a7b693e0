//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by status and backend
//! - `lb_request_duration_seconds` (histogram): end-to-end latency
//! - `lb_backend_alive` (gauge): 1=alive, 0=dead
//! - `lb_retries_total` (counter): same-backend retries
//! - `lb_failovers_total` (counter): backends abandoned mid-request
//! - `lb_rejections_total` (counter): 503s by reason
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, backend: &str, start: Instant) {
    counter!(
        "lb_requests_total",
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    histogram!("lb_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("lb_backend_alive", "backend" => backend.to_string()).set(if alive { 1.0 } else { 0.0 });
}

pub fn record_retry(backend: &str) {
    counter!("lb_retries_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_failover(backend: &str) {
    counter!("lb_failovers_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_rejection(reason: &'static str) {
    counter!("lb_rejections_total", "reason" => reason).increment(1);
}
