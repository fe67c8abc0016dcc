//! # Job State Machine
//!
//! Runtime-checked lifecycle for a single job. Every transition validates
//! the current status and returns a structured [`JobStateError`] instead of
//! silently ignoring an out-of-order worker update.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use taskgate_core::{JobId, TaskId, Timestamp, UserId};

// ── Job Status ───────────────────────────────────────────────────────

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and recorded, not yet handed to a launcher.
    Created,
    /// Launched, waiting for the worker to report start.
    Pending,
    /// The worker is executing the task.
    Running,
    /// Finished with a result. Terminal.
    Completed,
    /// Finished with an error. Terminal.
    Failed,
}

impl JobStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single progress step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

// ── Records ──────────────────────────────────────────────────────────

/// One named unit of progress reported by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: StepStatus,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

/// Ordered progress steps of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub steps: Vec<JobStep>,
}

impl JobProgress {
    /// The most recently started step, if it is still running.
    pub fn running_step(&self) -> Option<&JobStep> {
        self.steps
            .last()
            .filter(|step| step.status == StepStatus::Running)
    }

    fn close_running(&mut self, status: StepStatus, at: Timestamp) -> bool {
        match self.steps.last_mut() {
            Some(step) if step.status == StepStatus::Running => {
                step.status = status;
                step.completed_at = Some(at);
                true
            }
            _ => false,
        }
    }
}

/// Failure details attached to a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    /// Machine-readable code, e.g. `"TIMEOUT"`.
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
    /// Arbitrary structured context supplied by the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

impl JobError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            additional_info: None,
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.additional_info = Some(info);
        self
    }
}

// ── Error Types ──────────────────────────────────────────────────────

/// Rejected job transitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobStateError {
    /// The transition is not valid from the current status.
    #[error("invalid job transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Current status.
        from: JobStatus,
        /// Attempted target status.
        to: JobStatus,
        /// Human-readable reason for the rejection.
        reason: String,
    },
    /// The job has already completed or failed.
    #[error("job {id} is in terminal status {status}")]
    AlreadyTerminal {
        /// The job identifier.
        id: JobId,
        /// The terminal status.
        status: JobStatus,
    },
    /// A step update arrived while no step was running.
    #[error("job {id} has no running step")]
    NoRunningStep {
        /// The job identifier.
        id: JobId,
    },
    /// A new step was started before the current one was closed.
    #[error("job {id} step {step:?} is still running")]
    StepStillRunning {
        /// The job identifier.
        id: JobId,
        /// Name of the step that is still running.
        step: String,
    },
}

// ── Job ──────────────────────────────────────────────────────────────

/// A single execution of a task on behalf of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Validated parameters, in canonical JSON form.
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl Job {
    /// Record a new job in `Created` status.
    pub fn new(task_id: TaskId, user_id: UserId, parameters: Value) -> Self {
        Self {
            id: JobId::new(),
            task_id,
            user_id,
            status: JobStatus::Created,
            progress: JobProgress::default(),
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
            parameters,
            result: None,
            error: None,
        }
    }

    /// `Created → Pending`, once a launcher accepted the job.
    pub fn mark_pending(&mut self) -> Result<(), JobStateError> {
        self.ensure_active()?;
        if self.status != JobStatus::Created {
            return Err(self.invalid(JobStatus::Pending, "job was already launched"));
        }
        self.status = JobStatus::Pending;
        Ok(())
    }

    /// `Created | Pending → Running`. Clears any recorded progress.
    ///
    /// A worker may report start before the gateway has recorded the
    /// launch, so `Created` is accepted as well.
    pub fn start(&mut self) -> Result<(), JobStateError> {
        self.ensure_active()?;
        if self.status == JobStatus::Running {
            return Err(self.invalid(JobStatus::Running, "job is already running"));
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Timestamp::now());
        self.progress = JobProgress::default();
        Ok(())
    }

    /// Begin a new progress step. Only valid while running, and only when
    /// the previous step has been closed.
    pub fn start_step(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<(), JobStateError> {
        self.ensure_running(JobStatus::Running, "steps can only start while running")?;
        if let Some(step) = self.progress.running_step() {
            return Err(JobStateError::StepStillRunning {
                id: self.id,
                step: step.name.clone(),
            });
        }
        self.progress.steps.push(JobStep {
            name: name.into(),
            description,
            status: StepStatus::Running,
            started_at: Timestamp::now(),
            completed_at: None,
        });
        Ok(())
    }

    /// Mark the running step completed.
    pub fn finish_step(&mut self) -> Result<(), JobStateError> {
        self.close_step(StepStatus::Completed)
    }

    /// Mark the running step failed. The job itself stays running.
    pub fn fail_step(&mut self) -> Result<(), JobStateError> {
        self.close_step(StepStatus::Failed)
    }

    /// `Running → Completed`. A step left running is finished first.
    pub fn complete(&mut self, result: Value) -> Result<(), JobStateError> {
        self.ensure_running(JobStatus::Completed, "only a running job can complete")?;
        let now = Timestamp::now();
        self.progress.close_running(StepStatus::Completed, now);
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.result = Some(result);
        Ok(())
    }

    /// Any non-terminal status → `Failed`. A step left running is failed.
    pub fn fail(&mut self, error: JobError) -> Result<(), JobStateError> {
        self.ensure_active()?;
        let now = Timestamp::now();
        self.progress.close_running(StepStatus::Failed, now);
        self.status = JobStatus::Failed;
        self.completed_at = Some(now);
        self.error = Some(error);
        Ok(())
    }

    fn close_step(&mut self, status: StepStatus) -> Result<(), JobStateError> {
        self.ensure_running(JobStatus::Running, "steps can only change while running")?;
        if self.progress.close_running(status, Timestamp::now()) {
            Ok(())
        } else {
            Err(JobStateError::NoRunningStep { id: self.id })
        }
    }

    fn ensure_active(&self) -> Result<(), JobStateError> {
        if self.status.is_terminal() {
            return Err(JobStateError::AlreadyTerminal {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_running(&self, to: JobStatus, reason: &str) -> Result<(), JobStateError> {
        self.ensure_active()?;
        if self.status != JobStatus::Running {
            return Err(self.invalid(to, reason));
        }
        Ok(())
    }

    fn invalid(&self, to: JobStatus, reason: &str) -> JobStateError {
        JobStateError::InvalidTransition {
            from: self.status,
            to,
            reason: reason.to_string(),
        }
    }
}
