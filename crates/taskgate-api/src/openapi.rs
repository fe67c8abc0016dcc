//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "taskgate API",
        version = "0.1.0",
        description = "Task registration, schema-checked job execution, and job status reporting.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Tasks
        crate::routes::tasks::register_task,
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::get_task,
        crate::routes::tasks::grant_access,
        crate::routes::tasks::execute_task,
        // Jobs
        crate::routes::jobs::get_job,
        crate::routes::jobs::start_job,
        crate::routes::jobs::start_step,
        crate::routes::jobs::finish_step,
        crate::routes::jobs::fail_step,
        crate::routes::jobs::complete_job,
        crate::routes::jobs::fail_job,
    ),
    components(schemas(
        crate::state::TaskRecord,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Task DTOs
        crate::routes::tasks::CreateTaskRequest,
        crate::routes::tasks::GrantAccessRequest,
        crate::routes::tasks::GrantAccessResponse,
        crate::routes::tasks::ExecuteResponse,
        // Job DTOs
        crate::routes::jobs::JobView,
        crate::routes::jobs::StartStepRequest,
        crate::routes::jobs::CompleteJobRequest,
        crate::routes::jobs::FailJobRequest,
        crate::routes::jobs::JobErrorInput,
    )),
    tags(
        (name = "tasks", description = "Task registry and execution"),
        (name = "jobs", description = "Job status and worker updates"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
