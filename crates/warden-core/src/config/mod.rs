//! Configuration types for a Warden run.
//!
//! - [`RunOptions`]: concurrency, queue sizing and remediation gating for one run.
//! - [`LogConfig`]: log level and output format for the embedding binary.
//!
//! Both can be loaded from YAML; every field has a default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::policy::{Action, DEFAULT_WORKERS};

/// Errors that can occur while loading configuration or policy documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Settings for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Number of evaluation workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Execute remediation. When false every remediation is skipped as a dry run.
    #[serde(default)]
    pub apply: bool,

    /// Ask discoverers to list resources across all tenants.
    #[serde(default)]
    pub all_tenants: bool,

    /// Actions apply mode may execute. Empty allows every action.
    #[serde(default)]
    pub allow_actions: Vec<Action>,

    /// Capacity of the shared job queue.
    #[serde(default = "default_jobs_buffer")]
    pub jobs_buffer: usize,

    /// Capacity of the result queue.
    #[serde(default = "default_results_buffer")]
    pub results_buffer: usize,

    /// Cancel the run on SIGINT / SIGTERM.
    ///
    /// The handlers are process-wide and stay registered after the run ends,
    /// so the default SIGINT behavior of the process is not restored. Binaries
    /// that own their own shutdown handling should set this to false and cancel
    /// the run through its token instead.
    #[serde(default = "default_true")]
    pub handle_signals: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            apply: false,
            all_tenants: false,
            allow_actions: Vec::new(),
            jobs_buffer: default_jobs_buffer(),
            results_buffer: default_results_buffer(),
            handle_signals: true,
        }
    }
}

impl RunOptions {
    /// Parse run options from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load run options from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_apply(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    pub fn with_all_tenants(mut self, all_tenants: bool) -> Self {
        self.all_tenants = all_tenants;
        self
    }

    /// Restrict which actions apply mode may execute. Duplicates are ignored.
    pub fn with_allowed_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        let mut allow: Vec<Action> = actions.into_iter().collect();
        allow.sort();
        allow.dedup();
        self.allow_actions = allow;
        self
    }

    /// Set queue capacities. Zero keeps the current value.
    pub fn with_buffers(mut self, jobs: usize, results: usize) -> Self {
        if jobs > 0 {
            self.jobs_buffer = jobs;
        }
        if results > 0 {
            self.results_buffer = results;
        }
        self
    }

    /// Toggle SIGINT / SIGTERM handling. See [`RunOptions::handle_signals`].
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Whether apply mode may execute `action`.
    pub fn is_action_allowed(&self, action: Action) -> bool {
        self.allow_actions.is_empty() || self.allow_actions.contains(&action)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration for the embedding binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `warden_runtime=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_jobs_buffer() -> usize {
    1000
}

fn default_results_buffer() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
