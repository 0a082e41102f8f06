//! Metrics collection and exposition.
//!
//! # Metrics
//! - `envsync_reloads_total` (counter): reload pushes by scope, outcome
//! - `envsync_fetch_duration_seconds` (histogram): remote fetch latency by op
//! - `envsync_config_generation` (gauge): installed generation per key

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one handled reload message.
pub fn record_reload(scope: &'static str, outcome: &'static str) {
    metrics::counter!("envsync_reloads_total", "scope" => scope, "outcome" => outcome).increment(1);
}

/// Record how long a remote fetch took, whatever its outcome.
pub fn record_fetch(op: &'static str, started: Instant) {
    metrics::histogram!("envsync_fetch_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}

/// Publish the generation now installed for `key`.
pub fn record_generation(key: &str, generation: u64) {
    metrics::gauge!("envsync_config_generation", "key" => key.to_string()).set(generation as f64);
}
