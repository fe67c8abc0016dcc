//! # taskgate-api: Axum API Service
//!
//! HTTP front end of taskgate. Users register tasks with a parameter
//! schema and a result schema, grant each other access, and execute tasks
//! with a JSON body that is validated against the parameter schema before
//! a job is created and launched. Workers report progress and results
//! back through the job routes.
//!
//! ## Routes
//!
//! - `/v1/tasks/*`: registration, grants, execution
//! - `/v1/jobs/*`: status and worker updates
//! - `/openapi.json`: generated OpenAPI spec
//! - `/metrics`: Prometheus exposition (when a recorder is installed)
//! - `/health/*`: liveness and readiness probes
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsLayer → handlers. Caller identity is an extractor
//! on each `/v1` handler, not a layer.
//!
//! ## Crate Policy
//!
//! - No schema or lifecycle logic in route handlers; both live in the
//!   library crates.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod launcher;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::tasks::router())
        .merge(routes::jobs::router())
        .merge(openapi::router())
        .route("/metrics", get(middleware::metrics::render_metrics))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
