//! # Job API
//!
//! Job status reads and the worker-facing lifecycle updates. Every update
//! goes through the job state machine in `taskgate-state`; an update that
//! does not fit the job's current status is a 409.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use taskgate_core::{JobId, TaskId, Timestamp};
use taskgate_schema::{validate, ValidationMode};
use taskgate_state::{Job, JobError, JobProgress, JobStateError, JobStatus};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;

/// A job as returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobView {
    #[schema(value_type = String, format = Uuid)]
    pub id: JobId,
    #[schema(value_type = String)]
    pub task_id: TaskId,
    #[schema(value_type = String)]
    pub status: JobStatus,
    #[schema(value_type = Object)]
    pub progress: JobProgress,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
    #[schema(value_type = Option<String>)]
    pub started_at: Option<Timestamp>,
    #[schema(value_type = Option<String>)]
    pub completed_at: Option<Timestamp>,
    #[schema(value_type = Object)]
    pub parameters: Value,
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub error: Option<JobError>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            task_id: job.task_id.clone(),
            status: job.status,
            progress: job.progress.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            parameters: job.parameters.clone(),
            result: job.result.clone(),
            error: job.error.clone(),
        }
    }
}

/// Start a progress step.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartStepRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for StartStepRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("step name must not be empty".to_string());
        }
        Ok(())
    }
}

/// Complete a job with its result.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteJobRequest {
    /// Checked against the task's result schema.
    #[schema(value_type = Object)]
    pub result: Value,
}

/// Fail a job.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FailJobRequest {
    pub error: JobErrorInput,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JobErrorInput {
    pub code: String,
    pub message: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub additional_info: Option<Value>,
}

impl Validate for FailJobRequest {
    fn validate(&self) -> Result<(), String> {
        if self.error.code.trim().is_empty() {
            return Err("error code must not be empty".to_string());
        }
        Ok(())
    }
}

/// Build the jobs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/jobs/{job_id}", get(get_job))
        .route("/v1/jobs/{job_id}/start", post(start_job))
        .route("/v1/jobs/{job_id}/steps", post(start_step))
        .route("/v1/jobs/{job_id}/steps/current/complete", post(finish_step))
        .route("/v1/jobs/{job_id}/steps/current/fail", post(fail_step))
        .route("/v1/jobs/{job_id}/complete", post(complete_job))
        .route("/v1/jobs/{job_id}/fail", post(fail_job))
}

fn job_not_found(id: JobId) -> AppError {
    AppError::NotFound(format!("job {id} not found"))
}

/// Read a job owned by the caller. Other users' jobs are 404.
fn owned_job(state: &AppState, caller: &CallerIdentity, id: JobId) -> Result<Job, AppError> {
    state
        .jobs
        .get(&id)
        .filter(|job| job.user_id == caller.user)
        .ok_or_else(|| job_not_found(id))
}

/// Apply a state-machine transition to a job owned by the caller, under
/// the store's write lock.
fn transition(
    state: &AppState,
    caller: &CallerIdentity,
    id: JobId,
    f: impl FnOnce(&mut Job) -> Result<(), JobStateError>,
) -> Result<Json<JobView>, AppError> {
    let view = state
        .jobs
        .try_update(&id, |job| {
            if job.user_id != caller.user {
                return Err(job_not_found(id));
            }
            f(job)?;
            Ok(JobView::from(&*job))
        })
        .ok_or_else(|| job_not_found(id))??;
    tracing::info!(job_id = %id, status = %view.status, "job updated");
    Ok(Json(view))
}

/// GET /v1/jobs/{job_id}: Job status.
#[utoipa::path(
    get,
    path = "/v1/jobs/{job_id}",
    params(("job_id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job found", body = JobView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, AppError> {
    let job = owned_job(&state, &caller, JobId(job_id))?;
    Ok(Json(JobView::from(&job)))
}

/// POST /v1/jobs/{job_id}/start: The worker began executing.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job_id}/start",
    params(("job_id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job running", body = JobView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition", body = crate::error::ErrorBody),
    ),
    tag = "jobs"
)]
pub async fn start_job(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, AppError> {
    transition(&state, &caller, JobId(job_id), Job::start)
}

/// POST /v1/jobs/{job_id}/steps: Start a progress step.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job_id}/steps",
    params(("job_id" = Uuid, Path, description = "Job id")),
    request_body = StartStepRequest,
    responses(
        (status = 200, description = "Step started", body = JobView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition", body = crate::error::ErrorBody),
    ),
    tag = "jobs"
)]
pub async fn start_step(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job_id): Path<Uuid>,
    body: Result<Json<StartStepRequest>, JsonRejection>,
) -> Result<Json<JobView>, AppError> {
    let req = extract_validated_json(body)?;
    transition(&state, &caller, JobId(job_id), |job| {
        job.start_step(req.name, req.description)
    })
}

/// POST /v1/jobs/{job_id}/steps/current/complete: Finish the running step.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job_id}/steps/current/complete",
    params(("job_id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Step completed", body = JobView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "No running step", body = crate::error::ErrorBody),
    ),
    tag = "jobs"
)]
pub async fn finish_step(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, AppError> {
    transition(&state, &caller, JobId(job_id), Job::finish_step)
}

/// POST /v1/jobs/{job_id}/steps/current/fail: Fail the running step.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job_id}/steps/current/fail",
    params(("job_id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Step failed", body = JobView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "No running step", body = crate::error::ErrorBody),
    ),
    tag = "jobs"
)]
pub async fn fail_step(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, AppError> {
    transition(&state, &caller, JobId(job_id), Job::fail_step)
}

/// POST /v1/jobs/{job_id}/complete: Complete the job with a result.
///
/// The result is validated against the task's result schema in the
/// server's default mode, and stored in its validated form.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job_id}/complete",
    params(("job_id" = Uuid, Path, description = "Job id")),
    request_body = CompleteJobRequest,
    responses(
        (status = 200, description = "Job completed", body = JobView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition", body = crate::error::ErrorBody),
        (status = 422, description = "Result rejected", body = crate::error::ErrorBody),
    ),
    tag = "jobs"
)]
pub async fn complete_job(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job_id): Path<Uuid>,
    body: Result<Json<CompleteJobRequest>, JsonRejection>,
) -> Result<Json<JobView>, AppError> {
    let id = JobId(job_id);
    let job = owned_job(&state, &caller, id)?;
    let req = extract_json(body)?;

    let task = state
        .tasks
        .get(&job.task_id)
        .ok_or_else(|| AppError::Internal(format!("job {id} references missing task {}", job.task_id)))?;
    let descriptor = state
        .descriptors
        .get_or_build(&task.result_schema)
        .map_err(AppError::Schema)?;
    let mode = ValidationMode::from_strict(state.config.strict_default);
    let result = validate(&descriptor, &req.result, mode)
        .map_err(AppError::InvalidResult)?
        .to_json();

    transition(&state, &caller, id, |job| job.complete(result))
}

/// POST /v1/jobs/{job_id}/fail: Fail the job.
#[utoipa::path(
    post,
    path = "/v1/jobs/{job_id}/fail",
    params(("job_id" = Uuid, Path, description = "Job id")),
    request_body = FailJobRequest,
    responses(
        (status = 200, description = "Job failed", body = JobView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Job already finished", body = crate::error::ErrorBody),
    ),
    tag = "jobs"
)]
pub async fn fail_job(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(job_id): Path<Uuid>,
    body: Result<Json<FailJobRequest>, JsonRejection>,
) -> Result<Json<JobView>, AppError> {
    let req = extract_validated_json(body)?;
    let mut error = JobError::new(req.error.code, req.error.message);
    if let Some(info) = req.error.additional_info {
        error = error.with_info(info);
    }
    transition(&state, &caller, JobId(job_id), |job| job.fail(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskgate_core::UserId;

    fn caller(email: &str) -> CallerIdentity {
        CallerIdentity {
            user: UserId::new(email).unwrap(),
        }
    }

    fn seed_job(state: &AppState, owner: &CallerIdentity) -> JobId {
        let job = Job::new(
            TaskId::from_name("t").unwrap(),
            owner.user.clone(),
            json!({"a": 1}),
        );
        let id = job.id;
        state.jobs.insert(id, job);
        id
    }

    #[test]
    fn transition_applies_state_machine() {
        let state = AppState::new();
        let owner = caller("w@example.com");
        let id = seed_job(&state, &owner);

        let Json(view) = transition(&state, &owner, id, Job::start).unwrap();
        assert_eq!(view.status, JobStatus::Running);
        assert!(view.started_at.is_some());

        let err = transition(&state, &owner, id, Job::finish_step).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn other_users_jobs_are_hidden() {
        let state = AppState::new();
        let id = seed_job(&state, &caller("w@example.com"));
        let intruder = caller("x@example.com");

        assert!(matches!(owned_job(&state, &intruder, id), Err(AppError::NotFound(_))));
        assert!(matches!(
            transition(&state, &intruder, id, Job::start),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(state.jobs.get(&id).unwrap().status, JobStatus::Created);
    }

    #[test]
    fn unknown_job_is_not_found() {
        let state = AppState::new();
        let err = owned_job(&state, &caller("w@example.com"), JobId::new()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn job_view_mirrors_job() {
        let job = Job::new(
            TaskId::from_name("t").unwrap(),
            UserId::new("w@example.com").unwrap(),
            json!({"a": 1}),
        );
        let view = serde_json::to_value(JobView::from(&job)).unwrap();
        assert_eq!(view["status"], "created");
        assert_eq!(view["task_id"], "t");
        assert_eq!(view["parameters"], json!({"a": 1}));
        assert!(view["result"].is_null());
    }
}
