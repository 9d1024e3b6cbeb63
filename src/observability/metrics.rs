//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rejections_total` (counter): security-control rejections by reason
//! - `gateway_backend_calls_total` (counter): backend calls by backend, outcome
//! - `gateway_backend_call_duration_seconds` (histogram): per-call latency
//! - `gateway_audit_events_total` (counter): audit events by type
//! - `gateway_rate_windows` / `gateway_blocked_clients` (gauges): swept state sizes

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("gateway_rejections_total", "reason" => reason).increment(1);
}

pub fn record_backend_call(backend: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "gateway_backend_calls_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_backend_call_duration_seconds", "backend" => backend.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_audit_event(event_type: &'static str) {
    counter!("gateway_audit_events_total", "event_type" => event_type).increment(1);
}

pub fn record_rate_windows(count: usize) {
    gauge!("gateway_rate_windows").set(count as f64);
}

pub fn record_blocked_clients(count: usize) {
    gauge!("gateway_blocked_clients").set(count as f64);
}
