//! # Task API
//!
//! Task registration, access grants, and execution. Executing a task is
//! where parameters meet the schema engine: the request body is validated
//! against the task's parameter schema, and only a message that passes
//! becomes a job.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use taskgate_core::{JobId, TaskId, Timestamp, UserId};
use taskgate_schema::{check_schema_document, flatten_job_arguments, validate, ValidationMode};
use taskgate_state::{Job, JobError, JobStatus};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_optional_json, Validate};
use crate::launcher::LaunchRequest;
use crate::middleware::metrics::{
    JOBS_CREATED_TOTAL, LAUNCH_FAILURES_TOTAL, PARAMETER_REJECTIONS_TOTAL,
};
use crate::state::{AppState, TaskRecord};

/// Request to register a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    /// Human-readable name. The task id is derived from it.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = Object)]
    pub parameters_schema: Value,
    #[schema(value_type = Object)]
    pub result_schema: Value,
    /// Where the task runs, handed to the launcher.
    pub uri: String,
}

impl Validate for CreateTaskRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.len() > 255 {
            return Err("name must not exceed 255 characters".to_string());
        }
        if self.uri.trim().is_empty() {
            return Err("uri must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to grant another user access to a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantAccessRequest {
    /// Email of the user receiving access.
    pub user: String,
}

impl Validate for GrantAccessRequest {
    fn validate(&self) -> Result<(), String> {
        if self.user.trim().is_empty() {
            return Err("user must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GrantAccessResponse {
    #[schema(value_type = String)]
    pub task_id: TaskId,
    #[schema(value_type = String)]
    pub user: UserId,
    /// `false` when the user already had access.
    pub granted: bool,
}

/// Query parameters of the execute endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExecuteQuery {
    /// Reject unknown fields and integer-for-float substitution. Defaults
    /// to the server's configured mode.
    pub strict: Option<bool>,
}

/// A job accepted for execution.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExecuteResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: JobId,
    #[schema(value_type = String)]
    pub task_id: TaskId,
    #[schema(value_type = String)]
    pub status: JobStatus,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
    /// Validated parameters, with defaults filled in.
    #[schema(value_type = Object)]
    pub parameters: Value,
}

/// Build the tasks router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", post(register_task).get(list_tasks))
        .route("/v1/tasks/{task_id}", get(get_task))
        .route("/v1/tasks/{task_id}/grants", post(grant_access))
        .route("/v1/tasks/{task_id}/execute", post(execute_task))
}

/// Look up a task the caller may access.
///
/// Unknown tasks and tasks the caller has no grant for are both 404, so
/// task ids cannot be probed.
pub(crate) fn accessible_task(
    state: &AppState,
    caller: &CallerIdentity,
    raw_id: &str,
) -> Result<TaskRecord, AppError> {
    let not_found = || AppError::NotFound(format!("task {raw_id} not found"));
    let id = TaskId::parse(raw_id).map_err(|_| not_found())?;
    if !state.grants.has_access(&caller.user, &id) {
        return Err(not_found());
    }
    state.tasks.get(&id).ok_or_else(not_found)
}

/// Meta-validate a schema and make sure it builds.
fn check_task_schema(state: &AppState, field: &str, schema: &Value) -> Result<(), AppError> {
    check_schema_document(schema).map_err(|e| AppError::InvalidSchema(format!("{field}: {e}")))?;
    state
        .descriptors
        .get_or_build(schema)
        .map_err(|e| AppError::InvalidSchema(format!("{field}: {e}")))?;
    Ok(())
}

/// POST /v1/tasks: Register a task.
#[utoipa::path(
    post,
    path = "/v1/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task registered", body = TaskRecord),
        (status = 409, description = "Task id already taken", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request or schema", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn register_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let id = TaskId::from_name(&req.name)?;

    check_task_schema(&state, "parameters_schema", &req.parameters_schema)?;
    check_task_schema(&state, "result_schema", &req.result_schema)?;

    let record = TaskRecord {
        id: id.clone(),
        name: req.name,
        description: req.description,
        parameters_schema: req.parameters_schema,
        result_schema: req.result_schema,
        uri: req.uri,
        created_at: Timestamp::now(),
    };
    if !state.tasks.insert_new(id.clone(), record.clone()) {
        return Err(AppError::Conflict(format!("task {id} already exists")));
    }
    state.grants.grant(&caller.user, &id);

    tracing::info!(task_id = %id, user = %caller.user, "task registered");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/tasks: List the caller's tasks, oldest grant first.
#[utoipa::path(
    get,
    path = "/v1/tasks",
    responses(
        (status = 200, description = "Accessible tasks", body = Vec<TaskRecord>),
    ),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Json<Vec<TaskRecord>> {
    let tasks = state
        .grants
        .tasks_for(&caller.user)
        .iter()
        .filter_map(|id| state.tasks.get(id))
        .collect();
    Json(tasks)
}

/// GET /v1/tasks/{task_id}: Task details.
#[utoipa::path(
    get,
    path = "/v1/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task found", body = TaskRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, AppError> {
    accessible_task(&state, &caller, &task_id).map(Json)
}

/// POST /v1/tasks/{task_id}/grants: Grant another user access.
#[utoipa::path(
    post,
    path = "/v1/tasks/{task_id}/grants",
    params(("task_id" = String, Path, description = "Task id")),
    request_body = GrantAccessRequest,
    responses(
        (status = 200, description = "Access granted", body = GrantAccessResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid user", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn grant_access(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(task_id): Path<String>,
    body: Result<Json<GrantAccessRequest>, JsonRejection>,
) -> Result<Json<GrantAccessResponse>, AppError> {
    let task = accessible_task(&state, &caller, &task_id)?;
    let req = extract_validated_json(body)?;
    let user = UserId::new(&req.user)?;

    let granted = state.grants.grant(&user, &task.id);
    tracing::info!(task_id = %task.id, grantor = %caller.user, user = %user, granted, "task access granted");
    Ok(Json(GrantAccessResponse {
        task_id: task.id,
        user,
        granted,
    }))
}

/// POST /v1/tasks/{task_id}/execute: Validate parameters and launch a job.
#[utoipa::path(
    post,
    path = "/v1/tasks/{task_id}/execute",
    params(("task_id" = String, Path, description = "Task id"), ExecuteQuery),
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "Job created and launched", body = ExecuteResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Parameters rejected", body = crate::error::ErrorBody),
        (status = 502, description = "Launch failed", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn execute_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(task_id): Path<String>,
    query: Result<Query<ExecuteQuery>, QueryRejection>,
    body: Bytes,
) -> Result<(StatusCode, Json<ExecuteResponse>), AppError> {
    let task = accessible_task(&state, &caller, &task_id)?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let descriptor = state
        .descriptors
        .get_or_build(&task.parameters_schema)
        .map_err(AppError::Schema)?;

    let message = parse_optional_json(&body)?;
    let mode = ValidationMode::from_strict(query.strict.unwrap_or(state.config.strict_default));
    let parameters = match validate(&descriptor, &message, mode) {
        Ok(validated) => validated.to_json(),
        Err(e) => {
            metrics::counter!(PARAMETER_REJECTIONS_TOTAL, "kind" => e.kind().as_str()).increment(1);
            tracing::info!(task_id = %task.id, error = %e, "job parameters rejected");
            return Err(AppError::InvalidParameters(e));
        }
    };

    let job = Job::new(task.id.clone(), caller.user.clone(), parameters);
    let job_id = job.id;
    let request = LaunchRequest {
        job_id,
        task_id: task.id.clone(),
        uri: task.uri.clone(),
        args: flatten_job_arguments(&job.parameters, &job_id.to_string()),
    };
    state.jobs.insert(job_id, job);
    metrics::counter!(JOBS_CREATED_TOTAL).increment(1);

    if let Err(e) = state.launcher.launch(&request).await {
        metrics::counter!(LAUNCH_FAILURES_TOTAL).increment(1);
        tracing::error!(job_id = %job_id, task_id = %task.id, error = %e, "job launch failed");
        let error = JobError::new("LAUNCH_FAILED", e.to_string());
        if let Some(Err(state_err)) = state.jobs.try_update(&job_id, |job| job.fail(error)) {
            tracing::warn!(job_id = %job_id, error = %state_err, "could not record launch failure");
        }
        return Err(AppError::Upstream(format!("job {job_id} could not be launched")));
    }

    // A fast worker may already have reported start; only a job still in
    // `Created` moves to `Pending`.
    let job = state
        .jobs
        .try_update(&job_id, |job| {
            if job.status == JobStatus::Created {
                job.mark_pending()?;
            }
            Ok::<_, AppError>(job.clone())
        })
        .ok_or_else(|| AppError::Internal(format!("job {job_id} vanished after launch")))??;

    tracing::info!(job_id = %job_id, task_id = %task.id, user = %caller.user, "job launched");
    Ok((
        StatusCode::CREATED,
        Json(ExecuteResponse {
            id: job.id,
            task_id: job.task_id,
            status: job.status,
            created_at: job.created_at,
            parameters: job.parameters,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn caller(email: &str) -> CallerIdentity {
        CallerIdentity {
            user: UserId::new(email).unwrap(),
        }
    }

    fn seed(state: &AppState, owner: &CallerIdentity) -> TaskId {
        let id = TaskId::from_name("Hello World").unwrap();
        state.tasks.insert(
            id.clone(),
            TaskRecord {
                id: id.clone(),
                name: "Hello World".into(),
                description: String::new(),
                parameters_schema: json!({"properties": {"name": {"type": "string"}}}),
                result_schema: json!({}),
                uri: "hello".into(),
                created_at: Timestamp::now(),
            },
        );
        state.grants.grant(&owner.user, &id);
        id
    }

    #[test]
    fn create_task_request_validation() {
        let req = CreateTaskRequest {
            name: "Hello".into(),
            description: String::new(),
            parameters_schema: json!({}),
            result_schema: json!({}),
            uri: "hello".into(),
        };
        assert!(req.validate().is_ok());
        assert!(CreateTaskRequest { name: " ".into(), ..req }.validate().is_err());
    }

    #[test]
    fn accessible_task_requires_grant() {
        let state = AppState::new();
        let owner = caller("owner@example.com");
        seed(&state, &owner);

        assert!(accessible_task(&state, &owner, "hello_world").is_ok());
        assert!(matches!(
            accessible_task(&state, &caller("other@example.com"), "hello_world"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            accessible_task(&state, &owner, "Hello World"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn bad_schema_is_reported_per_field() {
        let state = AppState::new();
        let err = check_task_schema(&state, "result_schema", &json!({"type": "strng"})).unwrap_err();
        assert!(matches!(err, AppError::InvalidSchema(ref m) if m.starts_with("result_schema:")));

        let cyclic = json!({
            "$defs": {"A": {"properties": {"a": {"$ref": "#/$defs/A"}}}},
            "properties": {"a": {"$ref": "#/$defs/A"}},
        });
        let err = check_task_schema(&state, "parameters_schema", &cyclic).unwrap_err();
        assert!(matches!(err, AppError::InvalidSchema(ref m) if m.contains("circular")));
    }
}
