//! # taskgate-schema: Dynamic Parameter Types
//!
//! Turns a task's JSON Schema into a runtime type descriptor and checks
//! untrusted request bodies against it. No code is generated; descriptors
//! are plain data.
//!
//! ## Pipeline
//!
//! ```text
//! schema ──► resolve_definitions ──► synthesize ($defs, then root) ──► TypeDescriptor
//!                                                                          │
//! message ─────────────────────────────────────────────────► validate ◄────┘
//!                                                                │
//!                                                         ValidatedValue
//! ```
//!
//! - [`resolver`]: orders the record definitions in `$defs` so that every
//!   definition follows the definitions it references. Cycles are errors.
//! - [`synthesizer`]: maps one schema node to a [`TypeDescriptor`], looking
//!   up `$ref` targets in the descriptors built so far.
//! - [`validator`]: walks a JSON value against a descriptor in `Strict` or
//!   `Lenient` mode and produces a [`ValidatedValue`] or a path-carrying
//!   [`SchemaError`].
//!
//! ## Supporting Modules
//!
//! - [`cache`]: digest-keyed, single-flight cache of built descriptors.
//! - [`flatten`]: renders validated parameters as `--key value` arguments
//!   for the process that runs a job.
//! - [`document`]: JSON/YAML loading and JSON Schema meta-validation.
//!
//! ## Crate Policy
//!
//! - Depends only on `taskgate-core` internally.
//! - Every operation terminates on arbitrary input: reference discovery and
//!   synthesis are bounded by [`BuildOptions::max_depth`], and ordering uses
//!   Kahn's algorithm.

pub mod cache;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod flatten;
pub mod node;
pub mod path;
pub mod resolver;
pub mod synthesizer;
pub mod validator;
pub mod value;

pub use cache::DescriptorCache;
pub use descriptor::{EnumType, Field, PrimitiveKind, RecordType, TypeDescriptor};
pub use document::{check_schema_document, load_document, DocumentError};
pub use error::{SchemaError, SchemaErrorKind};
pub use flatten::{flatten_arguments, flatten_job_arguments};
pub use path::{PathSegment, ValuePath};
pub use resolver::{resolve_definitions, resolve_definitions_with};
pub use synthesizer::{build_type, build_type_with, synthesize, BuildOptions, Definitions};
pub use validator::{validate, validate_with_schema, ValidationMode};
pub use value::ValidatedValue;
