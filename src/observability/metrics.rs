//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_commands_relayed_total` (counter): commands claimed by the collector, by connection
//! - `bridge_offers_expired_total` (counter): commands nobody picked up, by connection
//! - `bridge_fetch_total` (counter): fetch outcomes (delivered, superseded, timeout)
//! - `bridge_answers_total` (counter): answers routed or dropped, by reason
//! - `bridge_socket_reconnects_total` (counter): failed socket dials, by connection
//! - `bridge_session_state` (gauge): 0=connecting 1=listening 2=awaiting_pickup 3=draining
//! - `bridge_cache_lookups_total` (counter): reference cache hits and misses
//! - `bridge_upstream_requests_total` (counter): REST calls by method and outcome

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(address: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(address).install() {
        Ok(()) => tracing::info!(address = %address, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %address, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_command_relayed(connection: usize) {
    counter!("bridge_commands_relayed_total", "connection" => connection.to_string()).increment(1);
}

pub fn record_offer_expired(connection: usize) {
    counter!("bridge_offers_expired_total", "connection" => connection.to_string()).increment(1);
}

pub fn record_fetch_outcome(outcome: &'static str) {
    counter!("bridge_fetch_total", "outcome" => outcome).increment(1);
}

pub fn record_answer_routed(connection: usize) {
    counter!(
        "bridge_answers_total",
        "connection" => connection.to_string(),
        "outcome" => "routed"
    )
    .increment(1);
}

pub fn record_answer_dropped(reason: &'static str) {
    counter!("bridge_answers_total", "outcome" => reason).increment(1);
}

pub fn record_socket_reconnect(connection: usize) {
    counter!("bridge_socket_reconnects_total", "connection" => connection.to_string()).increment(1);
}

pub fn record_session_state(connection: usize, state: u8) {
    gauge!("bridge_session_state", "connection" => connection.to_string()).set(f64::from(state));
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("bridge_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_upstream_request(method: &'static str, outcome: &'static str) {
    counter!(
        "bridge_upstream_requests_total",
        "method" => method,
        "outcome" => outcome
    )
    .increment(1);
}
