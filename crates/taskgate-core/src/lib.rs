//! # taskgate-core: Foundational Types
//!
//! Leaf crate of the taskgate workspace. Every other crate depends on
//! `taskgate-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `TaskId`, `JobId` and `UserId` are distinct
//!    types with validated constructors. A job id cannot be passed where a
//!    task id is expected.
//!
//! 2. **UTC-only timestamps.** [`Timestamp`] is always UTC, seconds precision,
//!    rendered with a `Z` suffix.
//!
//! 3. **Digests over serialized documents.** [`ContentDigest`] identifies a
//!    JSON document by the SHA-256 of its serialized bytes. The schema
//!    descriptor cache keys on it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `taskgate-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use digest::{digest_json, sha256_digest, ContentDigest};
pub use error::TaskgateError;
pub use identity::{JobId, TaskId, UserId};
pub use temporal::Timestamp;
