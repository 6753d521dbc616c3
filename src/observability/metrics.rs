//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relay calls by outcome
//!   (`ok`, `rate_limited`, `unreachable`, `transport_error`)
//! - `relay_sessions_total` (counter): accepted sessions
//! - `relay_active_sessions` (gauge): currently open sessions
//!
//! Recording is a no-op until [`init_metrics`] installs an exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own scrape listener.
///
/// Must be called from inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_relay(outcome: &'static str) {
    counter!("relay_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_session_opened(active: u64) {
    counter!("relay_sessions_total").increment(1);
    gauge!("relay_active_sessions").set(active as f64);
}

pub fn record_session_closed(active: u64) {
    gauge!("relay_active_sessions").set(active as f64);
}
