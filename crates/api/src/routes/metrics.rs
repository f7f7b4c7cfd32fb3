//! Prometheus scrape endpoint.
//!
//! Exposes the checkout counters (`checkout_attempts_total`,
//! `checkout_failures_total{code}`, `payment_intent_failures_total`,
//! `webhook_callbacks_total{outcome}`, `store_timeouts_total{operation}`,
//! `order_status_changes_total{status}`)
//! and the `checkout_duration_seconds` histogram.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics — renders every registered metric in text exposition format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_TEXT)], handle.render())
}
