//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_tx_status_total` (counter): status updates by `status`
//! - `gateway_tx_outcomes_total` (counter): submissions by `outcome`
//! - `gateway_tx_lock_contention_total` (counter): rejected by `category`
//! - `gateway_connection_reinit_total` (counter): connection replacements
//! - `gateway_node_ready` (gauge): 1 when the current connection is ready
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::tx::types::TxStatusKind;

/// Start the Prometheus scrape endpoint. Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_tx_status(status: TxStatusKind) {
    metrics::counter!("gateway_tx_status_total", "status" => status.as_str()).increment(1);
}

pub fn record_tx_outcome(outcome: &'static str) {
    metrics::counter!("gateway_tx_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_lock_contention(category: &str) {
    metrics::counter!("gateway_tx_lock_contention_total", "category" => category.to_string())
        .increment(1);
}

pub fn record_connection_reinit() {
    metrics::counter!("gateway_connection_reinit_total").increment(1);
}

pub fn record_node_ready(ready: bool) {
    metrics::gauge!("gateway_node_ready").set(if ready { 1.0 } else { 0.0 });
}
