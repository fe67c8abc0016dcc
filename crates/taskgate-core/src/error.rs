//! # Error Types
//!
//! Errors raised by the foundational types. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level error type for the foundational crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskgateError {
    /// A task identifier could not be derived from the given name.
    #[error("invalid task id {input:?}: {reason}")]
    InvalidTaskId {
        /// The raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A job identifier was not a UUID.
    #[error("invalid job id {input:?}: {reason}")]
    InvalidJobId {
        /// The raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A user identifier was not an email address.
    #[error("invalid user id {input:?}: {reason}")]
    InvalidUserId {
        /// The raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A timestamp could not be parsed.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// The raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Serialization failed while computing a digest.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TaskgateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
