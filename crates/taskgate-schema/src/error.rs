//! # Schema Errors
//!
//! One error type covers both phases of the pipeline. Build-time errors
//! mean the schema itself cannot be turned into a descriptor; validate-time
//! errors mean a message does not fit a descriptor. Each validate-time
//! variant carries the [`ValuePath`] of the offending value.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::path::ValuePath;

/// Error raised while building a descriptor or validating a message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    // ── Build-time ──────────────────────────────────────────────────
    /// Definitions reference each other in a loop.
    #[error("circular dependency between definitions: {}", .members.join(" -> "))]
    CircularDependency {
        /// Members of one cycle, in traversal order.
        members: Vec<String>,
    },

    /// A `$ref` names a definition that does not exist or is not yet built.
    #[error("unresolved reference {reference:?}")]
    UnresolvedReference {
        /// The `$ref` value as written.
        reference: String,
    },

    /// A schema node is not a shape this engine understands.
    #[error("malformed schema at {pointer}: {reason}")]
    MalformedSchema {
        /// JSON pointer to the node inside the schema document.
        pointer: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Schema nesting exceeds the configured limit.
    #[error("schema nesting exceeds the depth limit of {limit}")]
    DepthLimitExceeded {
        /// The configured limit.
        limit: usize,
    },

    // ── Validate-time ───────────────────────────────────────────────
    /// A required record field is absent.
    #[error("{path}: missing required field {field:?}")]
    MissingField {
        /// Path to the missing field.
        path: ValuePath,
        /// The field name.
        field: String,
    },

    /// Strict mode found a key the record does not declare.
    #[error("{path}: unexpected field {field:?}")]
    UnexpectedField {
        /// Path to the unexpected field.
        path: ValuePath,
        /// The field name.
        field: String,
    },

    /// The value's JSON kind does not match the descriptor.
    #[error("{path}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Path to the value.
        path: ValuePath,
        /// Description of the expected type.
        expected: String,
        /// JSON kind of the actual value.
        actual: String,
    },

    /// The value is not one of the enum's literals.
    #[error("{path}: {value} is not one of {}", DisplayValues(.allowed))]
    InvalidEnumValue {
        /// Path to the value.
        path: ValuePath,
        /// The rejected value.
        value: Value,
        /// The enum's literals, in declared order.
        allowed: Vec<Value>,
    },

    /// No union member accepted the value.
    #[error("{path}: no union member matched ({})", DisplayFailures(.failures))]
    NoUnionMemberMatched {
        /// Path to the value.
        path: ValuePath,
        /// One failure per member, in member order.
        failures: Vec<SchemaError>,
    },
}

/// Discriminant of [`SchemaError`], used for metrics labels and API details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaErrorKind {
    CircularDependency,
    UnresolvedReference,
    MalformedSchema,
    DepthLimitExceeded,
    MissingField,
    UnexpectedField,
    TypeMismatch,
    InvalidEnumValue,
    NoUnionMemberMatched,
}

impl SchemaErrorKind {
    /// Whether this kind describes a broken schema rather than a bad message.
    pub fn is_build_time(&self) -> bool {
        matches!(
            self,
            Self::CircularDependency
                | Self::UnresolvedReference
                | Self::MalformedSchema
                | Self::DepthLimitExceeded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CircularDependency => "circular_dependency",
            Self::UnresolvedReference => "unresolved_reference",
            Self::MalformedSchema => "malformed_schema",
            Self::DepthLimitExceeded => "depth_limit_exceeded",
            Self::MissingField => "missing_field",
            Self::UnexpectedField => "unexpected_field",
            Self::TypeMismatch => "type_mismatch",
            Self::InvalidEnumValue => "invalid_enum_value",
            Self::NoUnionMemberMatched => "no_union_member_matched",
        }
    }
}

impl fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SchemaError {
    pub fn kind(&self) -> SchemaErrorKind {
        match self {
            Self::CircularDependency { .. } => SchemaErrorKind::CircularDependency,
            Self::UnresolvedReference { .. } => SchemaErrorKind::UnresolvedReference,
            Self::MalformedSchema { .. } => SchemaErrorKind::MalformedSchema,
            Self::DepthLimitExceeded { .. } => SchemaErrorKind::DepthLimitExceeded,
            Self::MissingField { .. } => SchemaErrorKind::MissingField,
            Self::UnexpectedField { .. } => SchemaErrorKind::UnexpectedField,
            Self::TypeMismatch { .. } => SchemaErrorKind::TypeMismatch,
            Self::InvalidEnumValue { .. } => SchemaErrorKind::InvalidEnumValue,
            Self::NoUnionMemberMatched { .. } => SchemaErrorKind::NoUnionMemberMatched,
        }
    }

    /// Location of a validate-time failure. `None` for build-time errors.
    pub fn path(&self) -> Option<&ValuePath> {
        match self {
            Self::MissingField { path, .. }
            | Self::UnexpectedField { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::InvalidEnumValue { path, .. }
            | Self::NoUnionMemberMatched { path, .. } => Some(path),
            Self::CircularDependency { .. }
            | Self::UnresolvedReference { .. }
            | Self::MalformedSchema { .. }
            | Self::DepthLimitExceeded { .. } => None,
        }
    }

    pub(crate) fn malformed(pointer: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSchema {
            pointer: if pointer.is_empty() { "/".to_string() } else { pointer.to_string() },
            reason: reason.into(),
        }
    }
}

struct DisplayValues<'a>(&'a [Value]);

impl fmt::Display for DisplayValues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

struct DisplayFailures<'a>(&'a [SchemaError]);

impl fmt::Display for DisplayFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "member {i}: {e}")?;
        }
        Ok(())
    }
}
