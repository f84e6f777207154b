//! Metrics collection and exposition.
//!
//! # Metrics
//! - `netconf_http_requests_total` (counter): requests by method, status
//! - `netconf_http_request_duration_seconds` (histogram): handler latency
//! - `netconf_config_applies_total` (counter): write outcomes
//!   (`committed`, `rejected`, `applied`, `apply_failed`)
//! - `netconf_interfaces_connected` (gauge): interfaces with a connected link
//! - `netconf_hotspot_active` (gauge): 1 while the fallback hotspot is up

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "netconf_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("netconf_http_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_apply(outcome: &'static str) {
    metrics::counter!("netconf_config_applies_total", "outcome" => outcome).increment(1);
}

pub fn record_connected(count: usize) {
    metrics::gauge!("netconf_interfaces_connected").set(count as f64);
}

pub fn record_hotspot(active: bool) {
    metrics::gauge!("netconf_hotspot_active").set(if active { 1.0 } else { 0.0 });
}
