//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from taskgate-schema, taskgate-state and
//! taskgate-core to HTTP status codes with a JSON body carrying an error
//! code, a message and, for rejected payloads, structured details.
//! Internal error details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use taskgate_core::TaskgateError;
use taskgate_schema::SchemaError;
use taskgate_state::JobStateError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "INVALID_PARAMETERS").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// `{kind, path, message}` for rejected parameters or results.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or not visible to the caller (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid caller identity (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A schema supplied at registration is unusable (422).
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Job parameters do not match the task's parameter schema (422).
    #[error("invalid parameters: {0}")]
    InvalidParameters(SchemaError),

    /// A job result does not match the task's result schema (422).
    #[error("invalid result: {0}")]
    InvalidResult(SchemaError),

    /// A stored schema failed to build (500). Logged, not returned.
    #[error("schema error: {0}")]
    Schema(SchemaError),

    /// The job launcher failed (502).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::InvalidSchema(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_SCHEMA"),
            Self::InvalidParameters(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PARAMETERS"),
            Self::InvalidResult(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_RESULT"),
            Self::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SCHEMA_ERROR"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::Internal(_))
    }
}

/// `{kind, path, message}` for a rejected payload. `path` is `null` for
/// errors that are not tied to a position in the value.
fn rejection_details(err: &SchemaError) -> serde_json::Value {
    json!({
        "kind": err.kind().as_str(),
        "path": err.path().map(|p| p.to_string()),
        "message": err.to_string(),
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if self.is_internal() {
            tracing::error!(error = %self, "internal server error");
        }

        let (message, details) = match &self {
            Self::Internal(_) | Self::Schema(_) => ("An internal error occurred".to_string(), None),
            Self::InvalidParameters(e) | Self::InvalidResult(e) => {
                (self.to_string(), Some(rejection_details(e)))
            }
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Identifier and timestamp parse failures are client input errors.
impl From<TaskgateError> for AppError {
    fn from(err: TaskgateError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Out-of-order worker updates conflict with the job's current status.
impl From<JobStateError> for AppError {
    fn from(err: JobStateError) -> Self {
        Self::Conflict(err.to_string())
    }
}
