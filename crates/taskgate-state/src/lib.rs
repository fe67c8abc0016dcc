//! # taskgate-state: Job Lifecycle
//!
//! A job is one execution of a registered task. It is created when the
//! gateway accepts validated parameters and then advanced by the worker
//! running the task:
//!
//! ```text
//! Created ──► Pending ──► Running ──► Completed
//!    │           │           │
//!    └───────────┴───────────┴──────► Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. While `Running`, the worker
//! reports progress as a sequence of named steps; at most one step runs at
//! a time.

pub mod job;

pub use job::{Job, JobError, JobProgress, JobStateError, JobStatus, JobStep, StepStatus};
