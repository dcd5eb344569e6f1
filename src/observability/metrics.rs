//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_start_failures_total` (counter): by `kind` (`lifecycle`, `runner`)
//! - `lifecycle_rollbacks_total` (counter): by `outcome` (`ok`, `error`)
//! - `lifecycle_teardown_errors_total` (counter): by `step` (`runner_stop`, `lifecycle_stop`, `shutdown_hook`)
//! - `lifecycle_phase_duration_seconds` (histogram): by `phase` (`lifecycle_start`, `startup`, `teardown`)
//! - `runner_stops_total` (counter): by `runner`, `outcome`
//! - `health_check_failures_total` (counter): by `kind` (`liveness`, `readiness`), `check`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a tokio runtime. Failure is logged, not fatal.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_start_failure(kind: &'static str) {
    metrics::counter!("lifecycle_start_failures_total", "kind" => kind).increment(1);
}

pub fn record_rollback(outcome: &'static str) {
    metrics::counter!("lifecycle_rollbacks_total", "outcome" => outcome).increment(1);
}

pub fn record_teardown_error(step: &'static str) {
    metrics::counter!("lifecycle_teardown_errors_total", "step" => step).increment(1);
}

/// Record how long `phase` took, measured from `started`.
pub fn record_phase_duration(phase: &'static str, started: Instant) {
    metrics::histogram!("lifecycle_phase_duration_seconds", "phase" => phase)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_health_check_failure(kind: &'static str, check: &str) {
    metrics::counter!(
        "health_check_failures_total",
        "kind" => kind,
        "check" => check.to_string()
    )
    .increment(1);
}

pub fn record_runner_stop(runner: &str, outcome: &'static str) {
    metrics::counter!(
        "runner_stops_total",
        "runner" => runner.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
