//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): requests by method, status, backend
//! - `balancer_request_duration_seconds` (histogram): latency by method, backend
//! - `balancer_probe_total` (counter): probe outcomes by monitor
//! - `balancer_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `balancer_pool_backends` (gauge): pool size by membership

use std::net::SocketAddr;
use std::time::Instant;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed (or rejected) request.
pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    counter!(
        "balancer_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    histogram!(
        "balancer_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one probe result.
pub fn record_probe(monitor: &'static str, outcome: &'static str) {
    counter!("balancer_probe_total", "monitor" => monitor, "outcome" => outcome).increment(1);
}

/// Record a backend's current membership.
pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("balancer_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record pool sizes.
pub fn record_pool_size(healthy: usize, unhealthy: usize) {
    gauge!("balancer_pool_backends", "status" => "healthy").set(healthy as f64);
    gauge!("balancer_pool_backends", "status" => "unhealthy").set(unhealthy as f64);
}
