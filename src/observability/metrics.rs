//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (requests, latency, upstream health, bytes served)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status, route
//! - `edge_request_duration_seconds` (histogram): latency distribution
//! - `edge_upstream_health` (gauge): 1=healthy, 0=unhealthy
//! - `edge_static_bytes_total` (counter): asset bytes sent, by route
//! - `edge_rejected_total` (counter): requests refused before dispatch
//! - `edge_config_reloads_total` (counter): reloads by outcome
//! - `edge_config_version` (gauge): live snapshot version

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "edge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        "edge_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_health(upstream: &str, healthy: bool) {
    gauge!("edge_upstream_health", "upstream" => upstream.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_static_bytes(route: &str, bytes: u64) {
    counter!("edge_static_bytes_total", "route" => route.to_string()).increment(bytes);
}

pub fn record_rejected(reason: &'static str) {
    counter!("edge_rejected_total", "reason" => reason).increment(1);
}

pub fn record_reload(outcome: &'static str, version: u64) {
    counter!("edge_config_reloads_total", "outcome" => outcome).increment(1);
    gauge!("edge_config_version").set(version as f64);
}
