//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch and transaction metrics
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `rest_requests_total` (counter): dispatched requests by verb, status
//! - `rest_request_duration_seconds` (histogram): dispatch latency by verb
//! - `rest_filter_rejections_total` (counter): requests vetoed by a filter
//! - `db_transactions_total` (counter): closed sessions by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed, so library code and
//!   tests record unconditionally

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(verb: &str, status: u16, start: Instant) {
    let verb = verb.to_string();
    ::metrics::counter!(
        "rest_requests_total",
        "verb" => verb.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("rest_request_duration_seconds", "verb" => verb)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_filter_rejection() {
    ::metrics::counter!("rest_filter_rejections_total").increment(1);
}

pub fn record_transaction(outcome: &'static str) {
    ::metrics::counter!("db_transactions_total", "outcome" => outcome).increment(1);
}
