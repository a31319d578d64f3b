//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (outcomes, retries, breaker transitions, pool load)
//! - Expose Prometheus-compatible metrics endpoint
//! - Provide the injectable `MetricsSink` used by the resilient caller
//!
//! # Metrics
//! - `transactions_success_total` (counter): logical calls that succeeded
//! - `transactions_failure_total` (counter): logical calls that failed
//! - `transactions_failure_kind_total` (counter): failed calls by kind
//! - `downstream_retries_total` (counter): retry attempts by endpoint
//! - `circuit_breaker_transitions_total` (counter): by endpoint, state
//! - `circuit_breaker_rejections_total` (counter): short-circuited calls by endpoint
//! - `dispatch_pool_queued` / `dispatch_pool_active` (gauges)
//! - `batch_duration_seconds` / `batch_size` (histograms)
//! - `batch_failed_items_total` (counter)
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const TRANSACTIONS_SUCCESS: &str = "transactions_success_total";
pub const TRANSACTIONS_FAILURE: &str = "transactions_failure_total";

/// Fire-and-forget counter sink. Implementations must never block or fail.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: &'static str);
}

/// Forwards to the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeSink;

impl MetricsSink for FacadeSink {
    fn increment(&self, counter: &'static str) {
        metrics::counter!(counter).increment(1);
    }
}

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_failure_kind(kind: &'static str) {
    metrics::counter!("transactions_failure_kind_total", "kind" => kind).increment(1);
}

pub fn record_retry(endpoint: &str) {
    metrics::counter!("downstream_retries_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_breaker_transition(endpoint: &str, state: &'static str) {
    metrics::counter!(
        "circuit_breaker_transitions_total",
        "endpoint" => endpoint.to_string(),
        "state" => state
    )
    .increment(1);
}

pub fn record_breaker_rejection(endpoint: &str) {
    metrics::counter!("circuit_breaker_rejections_total", "endpoint" => endpoint.to_string())
        .increment(1);
}

pub fn record_pool_load(queued: usize, active: usize) {
    metrics::gauge!("dispatch_pool_queued").set(queued as f64);
    metrics::gauge!("dispatch_pool_active").set(active as f64);
}

pub fn record_batch(size: usize, failed: usize, start: Instant) {
    metrics::histogram!("batch_size").record(size as f64);
    metrics::histogram!("batch_duration_seconds").record(start.elapsed().as_secs_f64());
    metrics::counter!("batch_failed_items_total").increment(failed as u64);
}
