//! # Job Launchers
//!
//! A launcher receives a job that has passed parameter validation and
//! starts it somewhere. The gateway does not wait for the job to finish;
//! the worker reports progress back through the `/v1/jobs` routes.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;

use taskgate_core::{JobId, TaskId};

/// Everything a launcher needs to start one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub job_id: JobId,
    pub task_id: TaskId,
    /// Task location, as registered.
    pub uri: String,
    /// Flattened `--key value` arguments, including `--job_id`.
    pub args: Vec<String>,
}

/// A launch that did not happen.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The executable could not be started.
    #[error("failed to spawn '{uri}': {source}")]
    Spawn {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend refused the job.
    #[error("launcher rejected job {job_id}: {reason}")]
    Rejected { job_id: JobId, reason: String },
}

/// Starts jobs.
#[async_trait]
pub trait JobLauncher: Send + Sync + std::fmt::Debug {
    /// Start the job described by `request`. Returns once the job has been
    /// handed off, not when it finishes.
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError>;
}

/// Logs each launch and runs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLauncher;

#[async_trait]
impl JobLauncher for LogLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        tracing::info!(
            job_id = %request.job_id,
            task_id = %request.task_id,
            uri = %request.uri,
            args = ?request.args,
            "job launch (log only)"
        );
        Ok(())
    }
}

/// Runs the task URI as a local executable with the flattened arguments.
///
/// Task URIs come from whoever registered the task. Without a task
/// directory the URI is executed as given, `/bin/sh` included; set one
/// with [`ProcessLauncher::in_dir`] to confine launches to it.
///
/// The child is detached from the request: its exit status is collected
/// by a background task and logged.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    task_dir: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Launch any executable the URI names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only launch executables inside `dir`. URIs must then be relative
    /// paths without `.` or `..` components.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            task_dir: Some(dir.into()),
        }
    }

    /// Resolve the program to run for `request`.
    fn program(&self, request: &LaunchRequest) -> Result<PathBuf, LaunchError> {
        let Some(dir) = &self.task_dir else {
            return Ok(PathBuf::from(&request.uri));
        };
        let uri = Path::new(&request.uri);
        let contained = uri.components().next().is_some()
            && uri.components().all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(LaunchError::Rejected {
                job_id: request.job_id,
                reason: format!("task uri '{}' is outside the task directory", request.uri),
            });
        }
        Ok(dir.join(uri))
    }
}

#[async_trait]
impl JobLauncher for ProcessLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        let program = self.program(request)?;
        let mut child = tokio::process::Command::new(&program)
            .args(&request.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                uri: request.uri.clone(),
                source,
            })?;

        let job_id = request.job_id;
        tracing::info!(job_id = %job_id, pid = ?child.id(), program = %program.display(), "job process spawned");
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!(job_id = %job_id, "job process exited successfully");
                }
                Ok(status) => {
                    tracing::warn!(job_id = %job_id, code = ?status.code(), "job process exited with failure");
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "failed to wait for job process");
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> LaunchRequest {
        LaunchRequest {
            job_id: JobId::new(),
            task_id: TaskId::from_name("Hello World").unwrap(),
            uri: uri.to_string(),
            args: vec!["--name".into(), "World".into()],
        }
    }

    #[tokio::test]
    async fn log_launcher_always_succeeds() {
        LogLauncher.launch(&request("anything")).await.unwrap();
    }

    #[tokio::test]
    async fn process_launcher_reports_missing_executable() {
        let err = ProcessLauncher::new()
            .launch(&request("/nonexistent/taskgate-task"))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { ref uri, .. } if uri == "/nonexistent/taskgate-task"));
        assert!(err.to_string().starts_with("failed to spawn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_launcher_spawns_executable() {
        ProcessLauncher::new().launch(&request("true")).await.unwrap();
    }

    #[tokio::test]
    async fn task_dir_rejects_paths_outside_it() {
        let launcher = ProcessLauncher::in_dir("/opt/tasks");
        for uri in ["/bin/sh", "../bin/sh", "hello/../../bin/sh", "./hello", ""] {
            let err = launcher.launch(&request(uri)).await.unwrap_err();
            assert!(
                matches!(err, LaunchError::Rejected { ref reason, .. } if reason.contains("outside the task directory")),
                "{uri}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn task_dir_resolves_relative_uris() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ProcessLauncher::in_dir(dir.path());
        assert_eq!(
            launcher.program(&request("hello/run")).unwrap(),
            dir.path().join("hello/run")
        );
        // Resolved inside the directory, where nothing exists.
        let err = launcher.launch(&request("true")).await.unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }), "{err}");
    }
}
