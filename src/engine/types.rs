use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("action script missing: {path}")]
    MissingScript { path: String },
    #[error("action binary missing: {binary}")]
    MissingBinary { binary: String },
    #[error("action `{label}` failed with exit code {exit_code}: {stderr}")]
    NonZeroExit {
        label: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("action `{label}` timed out after {timeout_ms}ms")]
    Timeout { label: String, timeout_ms: u64 },
    #[error("action `{label}` interrupted by shutdown")]
    Interrupted { label: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One invocation of the external automation engine.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// Short human label used in log lines and errors.
    pub label: String,
    pub script: PathBuf,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    /// `None` waits for the child indefinitely.
    pub timeout: Option<Duration>,
}

impl ActionRequest {
    pub fn new(label: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            script: script.into(),
            env: BTreeMap::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub exit_code: i32,
    pub elapsed: Duration,
    /// Stderr lines that were not filtered as benign.
    pub stderr_lines: Vec<String>,
}

/// Runs a script to completion. Success means exit code 0; every other exit code, a
/// timeout, or an interrupted wait is a failure.
pub trait ActionRunner {
    fn run(&self, request: &ActionRequest) -> Result<ActionReport, ActionError>;
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> ActionError {
    ActionError::Io {
        path: path.display().to_string(),
        source,
    }
}
