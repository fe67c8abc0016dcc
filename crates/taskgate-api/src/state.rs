//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - **Tasks**: registered task definitions, keyed by their slug.
//! - **Jobs**: job records and their lifecycle, keyed by job id.
//! - **Grants**: which users may see and execute which tasks.
//! - **Descriptors**: built parameter and result types, shared across
//!   requests and keyed by schema content.
//! - **Launcher**: hands validated jobs to whatever runs them.
//!
//! Everything is in memory. Stores are `Arc` internally, so cloning the
//! state is cheap and every clone sees the same data.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use taskgate_core::{JobId, TaskId, Timestamp, UserId};
use taskgate_schema::{BuildOptions, DescriptorCache};
use taskgate_state::Job;

use crate::launcher::{JobLauncher, LogLauncher, ProcessLauncher};

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the lock is `parking_lot`, not
/// `tokio::sync`) because the lock is never held across an `.await`.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash, T: Clone> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Insert a record only if the key is free. Returns `false` when a
    /// record already exists; the existing record is left untouched.
    pub fn insert_new(&self, id: K, value: T) -> bool {
        match self.data.write().entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Retrieve a record by key.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure runs under a single write lock, so a check on the
    /// current state and the mutation that depends on it cannot interleave
    /// with another writer. Returns `None` if the record doesn't exist.
    pub fn try_update<R, E>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, T: Clone> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Access Grants ------------------------------------------------------------

/// Per-user task access lists, in the order access was granted.
#[derive(Debug, Clone, Default)]
pub struct AccessGrants {
    data: Arc<RwLock<HashMap<UserId, Vec<TaskId>>>>,
}

impl AccessGrants {
    /// Grant `user` access to `task`. Returns `false` if it was already granted.
    pub fn grant(&self, user: &UserId, task: &TaskId) -> bool {
        let mut guard = self.data.write();
        let tasks = guard.entry(user.clone()).or_default();
        if tasks.contains(task) {
            return false;
        }
        tasks.push(task.clone());
        true
    }

    /// Whether `user` may access `task`.
    pub fn has_access(&self, user: &UserId, task: &TaskId) -> bool {
        self.data
            .read()
            .get(user)
            .is_some_and(|tasks| tasks.contains(task))
    }

    /// Tasks granted to `user`, oldest grant first.
    pub fn tasks_for(&self, user: &UserId) -> Vec<TaskId> {
        self.data.read().get(user).cloned().unwrap_or_default()
    }
}

// -- Records ------------------------------------------------------------------

/// A registered task: what runs, and the shape of what goes in and out.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskRecord {
    /// Slug derived from `name`.
    #[schema(value_type = String)]
    pub id: TaskId,
    pub name: String,
    pub description: String,
    /// JSON Schema every execution's parameters are validated against.
    #[schema(value_type = Object)]
    pub parameters_schema: Value,
    /// JSON Schema a completed job's result is validated against.
    #[schema(value_type = Object)]
    pub result_schema: Value,
    /// Location of the task executable, handed to the launcher.
    pub uri: String,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
}

// -- Configuration ------------------------------------------------------------

/// Which [`JobLauncher`] the server starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LauncherKind {
    /// Log the launch and do nothing else.
    #[default]
    Log,
    /// Spawn the task URI as a local executable.
    ///
    /// Any caller can register a task, so without `TASKGATE_TASK_DIR` this
    /// runs whatever executable a task names.
    Process,
}

impl FromStr for LauncherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "process" => Ok(Self::Process),
            other => Err(format!("unknown launcher '{other}', expected 'log' or 'process'")),
        }
    }
}

/// Log output format of the server binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Read `TASKGATE_LOG_FORMAT`. Unknown values select text output.
    pub fn from_env() -> Self {
        std::env::var("TASKGATE_LOG_FORMAT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected 'text' or 'json'")),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Validation mode used when a request does not pass `?strict=`.
    pub strict_default: bool,
    /// Deepest schema nesting accepted when building descriptors.
    pub max_schema_depth: usize,
    pub launcher: LauncherKind,
    /// Directory the process launcher is confined to.
    pub task_dir: Option<PathBuf>,
    /// Whether the binary installs a Prometheus recorder and serves `/metrics`.
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            strict_default: false,
            max_schema_depth: BuildOptions::default().max_depth,
            launcher: LauncherKind::default(),
            task_dir: None,
            metrics_enabled: true,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `PORT` | `port` |
    /// | `TASKGATE_STRICT_DEFAULT` | `strict_default` |
    /// | `TASKGATE_MAX_SCHEMA_DEPTH` | `max_schema_depth` |
    /// | `TASKGATE_LAUNCHER` | `launcher` |
    /// | `TASKGATE_TASK_DIR` | `task_dir` |
    /// | `TASKGATE_METRICS_ENABLED` | `metrics_enabled` |
    /// | `TASKGATE_LOG_FORMAT` | `log_format` |
    ///
    /// Unset variables take the default. Invalid values log a warning and
    /// take the default as well.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`AppConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_schema_depth = match parse_or(&lookup, "TASKGATE_MAX_SCHEMA_DEPTH", defaults.max_schema_depth) {
            0 => {
                tracing::warn!(
                    key = "TASKGATE_MAX_SCHEMA_DEPTH",
                    "schema depth limit must be positive, using default"
                );
                defaults.max_schema_depth
            }
            depth => depth,
        };
        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            strict_default: parse_or(&lookup, "TASKGATE_STRICT_DEFAULT", defaults.strict_default),
            max_schema_depth,
            launcher: parse_or(&lookup, "TASKGATE_LAUNCHER", defaults.launcher),
            task_dir: lookup("TASKGATE_TASK_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            metrics_enabled: parse_or(&lookup, "TASKGATE_METRICS_ENABLED", defaults.metrics_enabled),
            log_format: parse_or(&lookup, "TASKGATE_LOG_FORMAT", defaults.log_format),
        }
    }

    /// Descriptor build limits derived from this configuration.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            max_depth: self.max_schema_depth,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "invalid configuration value, using default");
            default
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub tasks: Store<TaskId, TaskRecord>,
    pub jobs: Store<JobId, Job>,
    pub grants: AccessGrants,
    /// Built descriptors, keyed by schema digest.
    pub descriptors: Arc<DescriptorCache>,
    pub launcher: Arc<dyn JobLauncher>,
    /// Renders `/metrics`. `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    pub config: AppConfig,
}

impl AppState {
    /// Create a new application state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create a new application state, choosing the launcher from `config`.
    pub fn with_config(config: AppConfig) -> Self {
        let launcher: Arc<dyn JobLauncher> = match config.launcher {
            LauncherKind::Log => Arc::new(LogLauncher),
            LauncherKind::Process => match &config.task_dir {
                Some(dir) => Arc::new(ProcessLauncher::in_dir(dir)),
                None => {
                    tracing::warn!("process launcher has no TASKGATE_TASK_DIR, task uris run unconfined");
                    Arc::new(ProcessLauncher::new())
                }
            },
        };
        Self {
            tasks: Store::new(),
            jobs: Store::new(),
            grants: AccessGrants::default(),
            descriptors: Arc::new(DescriptorCache::new(config.build_options())),
            launcher,
            metrics: None,
            config,
        }
    }

    /// Replace the launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn JobLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Serve `/metrics` from `handle`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
