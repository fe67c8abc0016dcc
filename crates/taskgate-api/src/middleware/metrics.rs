//! # Prometheus Metrics
//!
//! Request metrics recorded through the `metrics` facade. The binary
//! installs a Prometheus recorder and `/metrics` renders it; without a
//! recorder every `counter!` is a no-op.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "taskgate_http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "taskgate_http_request_duration_seconds";
pub const JOBS_CREATED_TOTAL: &str = "taskgate_jobs_created_total";
pub const PARAMETER_REJECTIONS_TOTAL: &str = "taskgate_parameter_rejections_total";
pub const LAUNCH_FAILURES_TOTAL: &str = "taskgate_launch_failures_total";

/// Register help text for every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP requests served, by status code.");
    metrics::describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "HTTP request latency."
    );
    metrics::describe_counter!(JOBS_CREATED_TOTAL, "Jobs accepted for launch.");
    metrics::describe_counter!(
        PARAMETER_REJECTIONS_TOTAL,
        "Job executions rejected by parameter validation, by error kind."
    );
    metrics::describe_counter!(LAUNCH_FAILURES_TOTAL, "Jobs the launcher failed to start.");
}

/// Middleware that counts requests by status and records their latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "status" => status).increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    response
}

/// GET /metrics: Prometheus text exposition.
///
/// 404 when the server runs without a recorder.
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}
