//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `rate_limit_rejections_total` (counter): requests answered 429
//! - `auth_gate_outcomes_total` (counter): authentication gate result by outcome
//! - `tokens_revoked_total` (counter): revocation markers written
//! - `store_errors_total` (counter): shared store failures by operation

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("rate_limit_rejections_total").increment(1);
}

pub fn record_gate_outcome(outcome: &'static str) {
    ::metrics::counter!("auth_gate_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_token_revoked() {
    ::metrics::counter!("tokens_revoked_total").increment(1);
}

pub fn record_store_error(operation: &'static str) {
    ::metrics::counter!("store_errors_total", "operation" => operation).increment(1);
}
