//! # API Route Modules
//!
//! - `tasks`: task registration, access grants, and execution
//!   (parameter validation and job launch).
//! - `jobs`: job status, and the lifecycle updates workers report while a
//!   job runs.

pub mod jobs;
pub mod tasks;
