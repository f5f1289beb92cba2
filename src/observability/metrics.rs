//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): time to response head, by route
//! - `gateway_upstream_errors_total` (counter): forward failures by route, kind
//! - `gateway_fallbacks_total` (counter): fallback invocations by route
//! - `gateway_route_table_reloads_total` (counter): reloads by outcome
//! - `customers_subscribers` (gauge): attached consumers by transport
//! - `customers_emitted_total` (counter): customers produced
//! - `customers_encode_errors_total` (counter): dropped messages by transport
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the Prometheus exporter
//!   is only installed when enabled
//! - Requests that matched no route use the `none` route label

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Route label for requests that never selected a route.
pub const NO_ROUTE: &str = "none";

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(route: &str, kind: &'static str) {
    counter!("gateway_upstream_errors_total", "route" => route.to_string(), "kind" => kind)
        .increment(1);
}

pub fn record_fallback(route: &str) {
    counter!("gateway_fallbacks_total", "route" => route.to_string()).increment(1);
}

pub fn record_reload(outcome: &'static str) {
    counter!("gateway_route_table_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_subscriber_attached(transport: &'static str) {
    gauge!("customers_subscribers", "transport" => transport).increment(1.0);
}

pub fn record_subscriber_detached(transport: &'static str) {
    gauge!("customers_subscribers", "transport" => transport).decrement(1.0);
}

pub fn record_emitted() {
    counter!("customers_emitted_total").increment(1);
}

pub fn record_encode_error(transport: &'static str) {
    counter!("customers_encode_errors_total", "transport" => transport).increment(1);
}
