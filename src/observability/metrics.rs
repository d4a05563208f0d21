//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define front-end metrics (requests, latency, rejections, faults, connections)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `weblistener_requests_total` (counter): responses written, by method and status
//! - `weblistener_request_duration_seconds` (histogram): dispatch latency
//! - `weblistener_rejections_total` (counter): routing failures, by reason
//! - `weblistener_faults_total` (counter): application faults, by kind
//! - `weblistener_aborts_total` (counter): requests retired on a closed connection
//! - `weblistener_registered_prefixes` (gauge): prefixes in the table
//! - `weblistener_active_connections` (gauge): live TCP connections
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so library users
//!   and tests pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &Method, status: StatusCode, start: Instant) {
    let labels = [
        ("method", method.as_str().to_string()),
        ("status", status.as_u16().to_string()),
    ];
    counter!("weblistener_requests_total", &labels).increment(1);
    histogram!("weblistener_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("weblistener_rejections_total", "reason" => reason).increment(1);
}

pub fn record_fault(kind: &'static str) {
    counter!("weblistener_faults_total", "kind" => kind).increment(1);
}

pub fn record_abort() {
    counter!("weblistener_aborts_total").increment(1);
}

pub fn set_registered_prefixes(count: usize) {
    gauge!("weblistener_registered_prefixes").set(count as f64);
}

pub fn set_active_connections(count: u64) {
    gauge!("weblistener_active_connections").set(count as f64);
}
