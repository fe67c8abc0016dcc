//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers that flow through taskgate.
//! Tasks are addressed by a slug derived from their name, jobs by a
//! random UUID, and users by their email address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskgateError;

/// Characters replaced by `_` when deriving a task slug.
const SLUG_REPLACED: &[char] = &['[', ']', '/', ' ', '\\', '?', '<', '>', ':', '|', '*', '@'];

/// Identifier of a registered task.
///
/// Derived from the human-readable task name: characters that are unsafe in
/// paths or branch names become `_`, surrounding whitespace is trimmed, and
/// the result is lowercased. `"Hello World"` becomes `"hello_world"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Derive a task id from a task name.
    pub fn from_name(name: &str) -> Result<Self, TaskgateError> {
        let slug: String = name
            .trim()
            .chars()
            .map(|c| if SLUG_REPLACED.contains(&c) { '_' } else { c })
            .collect::<String>()
            .to_lowercase();
        if slug.is_empty() {
            return Err(TaskgateError::InvalidTaskId {
                input: name.to_string(),
                reason: "task name must not be empty".to_string(),
            });
        }
        Ok(Self(slug))
    }

    /// Parse an existing task id, rejecting anything that is not already
    /// in normalized form.
    pub fn parse(s: &str) -> Result<Self, TaskgateError> {
        let id = Self::from_name(s)?;
        if id.0 != s {
            return Err(TaskgateError::InvalidTaskId {
                input: s.to_string(),
                reason: format!("not a normalized task id (expected {:?})", id.0),
            });
        }
        Ok(id)
    }

    /// The slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskgateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a job (one execution of a task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random job identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for JobId {
    type Err = TaskgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TaskgateError::InvalidJobId {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user: their email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap an email address. Surrounding whitespace is trimmed.
    pub fn new(email: &str) -> Result<Self, TaskgateError> {
        let email = email.trim();
        let reject = |reason: &str| TaskgateError::InvalidUserId {
            input: email.to_string(),
            reason: reason.to_string(),
        };
        if email.is_empty() {
            return Err(reject("user email must not be empty"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(reject("user email must have the form local@domain")),
        }
        if email.chars().any(char::is_whitespace) {
            return Err(reject("user email must not contain whitespace"));
        }
        Ok(Self(email.to_string()))
    }

    /// The email as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = TaskgateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn task_id_normalizes_name() {
        let id = TaskId::from_name("  Hello World ").unwrap();
        assert_eq!(id.as_str(), "hello_world");
    }

    #[test]
    fn task_id_replaces_unsafe_characters() {
        let id = TaskId::from_name("Speech/Recognition: v2?").unwrap();
        assert_eq!(id.as_str(), "speech_recognition__v2_");
    }

    #[test]
    fn task_id_rejects_empty() {
        assert!(TaskId::from_name("   ").is_err());
        assert!(TaskId::from_name("").is_err());
    }

    #[test]
    fn task_id_parse_requires_normalized_form() {
        assert!(TaskId::parse("hello_world").is_ok());
        let err = TaskId::parse("Hello World").unwrap_err();
        assert!(matches!(err, TaskgateError::InvalidTaskId { .. }));
    }

    #[test]
    fn task_id_serde_roundtrip() {
        let id = TaskId::from_name("Hello World").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"hello_world\"");
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<TaskId>("\"Not Normal\"").is_err());
    }

    #[test]
    fn job_id_parse_roundtrip() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn job_id_rejects_garbage() {
        let err = "not-a-uuid".parse::<JobId>().unwrap_err();
        assert!(matches!(err, TaskgateError::InvalidJobId { .. }));
    }

    #[test]
    fn user_id_accepts_email() {
        let id = UserId::new(" alice@example.com ").unwrap();
        assert_eq!(id.as_str(), "alice@example.com");
    }

    #[test]
    fn user_id_rejects_malformed() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("alice").is_err());
        assert!(UserId::new("@example.com").is_err());
        assert!(UserId::new("alice@").is_err());
        assert!(UserId::new("al ice@example.com").is_err());
    }

    proptest! {
        #[test]
        fn task_id_from_name_is_idempotent(name in "[ -~]{1,40}") {
            if let Ok(id) = TaskId::from_name(&name) {
                let again = TaskId::from_name(id.as_str()).unwrap();
                prop_assert_eq!(again, id);
            }
        }
    }
}
