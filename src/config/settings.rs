use super::ConfigError;
use crate::jobs::JobKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerRole {
    VideoWorker,
    VideoDispatcher,
    ImageWorker,
    ImageDispatcher,
}

impl WorkerRole {
    /// The job kind this role executes; dispatcher roles run elsewhere.
    pub fn executes(self) -> Option<JobKind> {
        match self {
            Self::VideoWorker => Some(JobKind::Video),
            Self::ImageWorker => Some(JobKind::Image),
            Self::VideoDispatcher | Self::ImageDispatcher => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
    #[serde(default = "default_roles")]
    pub roles: Vec<WorkerRole>,
    #[serde(default = "default_sync_root")]
    pub sync_root: PathBuf,
    #[serde(default = "default_runtime_root")]
    pub runtime_root: PathBuf,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub action: ActionConfig,
    #[serde(default)]
    pub pipelines: PipelinesConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            roles: default_roles(),
            sync_root: default_sync_root(),
            runtime_root: default_runtime_root(),
            policy: PolicyConfig::default(),
            action: ActionConfig::default(),
            pipelines: PipelinesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_action_timeout_seconds")]
    pub action_timeout_seconds: u64,
    #[serde(default = "default_refresh_timeout_seconds")]
    pub refresh_timeout_seconds: u64,
    #[serde(default = "default_straggler_timeout_seconds")]
    pub straggler_timeout_seconds: u64,
    #[serde(default = "default_artifact_poll_ms")]
    pub artifact_poll_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_pause_backoff_ms")]
    pub pause_backoff_ms: u64,
    #[serde(default = "default_drain_yield_ms")]
    pub drain_yield_ms: u64,
    #[serde(default = "default_inbox_scan_ms")]
    pub inbox_scan_ms: u64,
    #[serde(default = "default_write_stability_ms")]
    pub write_stability_ms: u64,
    #[serde(default = "default_inbox_depth")]
    pub inbox_depth: usize,
    #[serde(default = "default_max_job_passes")]
    pub max_job_passes: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            action_timeout_seconds: default_action_timeout_seconds(),
            refresh_timeout_seconds: default_refresh_timeout_seconds(),
            straggler_timeout_seconds: default_straggler_timeout_seconds(),
            artifact_poll_ms: default_artifact_poll_ms(),
            debounce_ms: default_debounce_ms(),
            pause_backoff_ms: default_pause_backoff_ms(),
            drain_yield_ms: default_drain_yield_ms(),
            inbox_scan_ms: default_inbox_scan_ms(),
            write_stability_ms: default_write_stability_ms(),
            inbox_depth: default_inbox_depth(),
            max_job_passes: default_max_job_passes(),
        }
    }
}

impl PolicyConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_seconds)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_seconds)
    }

    pub fn straggler_timeout(&self) -> Duration {
        Duration::from_secs(self.straggler_timeout_seconds)
    }

    pub fn artifact_poll_interval(&self) -> Duration {
        Duration::from_millis(self.artifact_poll_ms)
    }

    pub fn debounce_quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn pause_backoff(&self) -> Duration {
        Duration::from_millis(self.pause_backoff_ms)
    }

    pub fn drain_yield(&self) -> Duration {
        Duration::from_millis(self.drain_yield_ms)
    }

    pub fn inbox_scan_interval(&self) -> Duration {
        Duration::from_millis(self.inbox_scan_ms)
    }

    pub fn write_stability(&self) -> Duration {
        Duration::from_millis(self.write_stability_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActionConfig {
    #[serde(default = "default_action_binary")]
    pub binary: String,
    /// Arguments passed to `binary`; `{script}` is replaced by the script path.
    #[serde(default = "default_action_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_benign_stderr")]
    pub benign_stderr: Vec<String>,
    #[serde(default = "default_true")]
    pub reap_stale_processes: bool,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            binary: default_action_binary(),
            args: default_action_args(),
            env: BTreeMap::new(),
            benign_stderr: default_benign_stderr(),
            reap_stale_processes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub script: String,
    #[serde(default)]
    pub refresh_script: Option<String>,
    pub expected_artifacts: usize,
    pub artifact_extension: String,
    /// Flag file names that abort an attempt. Empty means any flag file aborts.
    #[serde(default)]
    pub abort_flags: Vec<String>,
    #[serde(default)]
    pub default_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelinesConfig {
    #[serde(default = "default_image_pipeline")]
    pub image: PipelineConfig,
    #[serde(default = "default_video_pipeline")]
    pub video: PipelineConfig,
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            image: default_image_pipeline(),
            video: default_video_pipeline(),
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_worker_id(&self.worker_id).map_err(ConfigError::Settings)?;
        for (field, path) in [
            ("sync_root", &self.sync_root),
            ("runtime_root", &self.runtime_root),
        ] {
            if !path.is_absolute() {
                return Err(ConfigError::Settings(format!(
                    "`{field}` must be an absolute path"
                )));
            }
        }

        let policy = &self.policy;
        for (field, value) in [
            ("policy.action_timeout_seconds", policy.action_timeout_seconds),
            ("policy.refresh_timeout_seconds", policy.refresh_timeout_seconds),
            (
                "policy.straggler_timeout_seconds",
                policy.straggler_timeout_seconds,
            ),
            ("policy.artifact_poll_ms", policy.artifact_poll_ms),
            ("policy.inbox_scan_ms", policy.inbox_scan_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Settings(format!("`{field}` must be >= 1")));
            }
        }
        if policy.max_job_passes == 0 {
            return Err(ConfigError::Settings(
                "`policy.max_job_passes` must be >= 1".to_string(),
            ));
        }

        if self.action.binary.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`action.binary` must be non-empty".to_string(),
            ));
        }
        if !self.action.args.iter().any(|arg| arg.contains("{script}")) {
            return Err(ConfigError::Settings(
                "`action.args` must reference the `{script}` placeholder".to_string(),
            ));
        }

        for kind in JobKind::ALL {
            let pipeline = self.pipeline(kind);
            if pipeline.script.trim().is_empty() {
                return Err(ConfigError::Settings(format!(
                    "`pipelines.{kind}.script` must be non-empty"
                )));
            }
            if pipeline.expected_artifacts == 0 {
                return Err(ConfigError::Settings(format!(
                    "`pipelines.{kind}.expected_artifacts` must be >= 1"
                )));
            }
            if !pipeline.artifact_extension.starts_with('.') {
                return Err(ConfigError::Settings(format!(
                    "`pipelines.{kind}.artifact_extension` must start with '.'"
                )));
            }
        }
        Ok(())
    }

    pub fn pipeline(&self, kind: JobKind) -> &PipelineConfig {
        match kind {
            JobKind::Image => &self.pipelines.image,
            JobKind::Video => &self.pipelines.video,
        }
    }

    /// Job kinds this node executes, in a stable order.
    pub fn enabled_kinds(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| {
                self.roles
                    .iter()
                    .any(|role| role.executes() == Some(*kind))
            })
            .collect()
    }
}

fn validate_worker_id(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("`worker_id` must be non-empty".to_string());
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err("`worker_id` must use only ASCII letters, digits, '-' or '_'".to_string())
}

fn default_worker_id() -> String {
    "worker001".to_string()
}

fn default_roles() -> Vec<WorkerRole> {
    vec![
        WorkerRole::VideoWorker,
        WorkerRole::VideoDispatcher,
        WorkerRole::ImageWorker,
        WorkerRole::ImageDispatcher,
    ]
}

fn default_sync_root() -> PathBuf {
    PathBuf::from("/srv/renderfleet/sync")
}

fn default_runtime_root() -> PathBuf {
    PathBuf::from("/srv/renderfleet/runtime")
}

fn default_max_retries() -> u32 {
    1
}

fn default_action_timeout_seconds() -> u64 {
    30 * 60
}

fn default_refresh_timeout_seconds() -> u64 {
    5 * 60
}

fn default_straggler_timeout_seconds() -> u64 {
    5 * 60
}

fn default_artifact_poll_ms() -> u64 {
    2_000
}

fn default_debounce_ms() -> u64 {
    3_000
}

fn default_pause_backoff_ms() -> u64 {
    5_000
}

fn default_drain_yield_ms() -> u64 {
    2_000
}

fn default_inbox_scan_ms() -> u64 {
    500
}

fn default_write_stability_ms() -> u64 {
    2_000
}

fn default_inbox_depth() -> usize {
    2
}

fn default_max_job_passes() -> u32 {
    3
}

fn default_action_binary() -> String {
    "/usr/bin/actexec".to_string()
}

fn default_action_args() -> Vec<String> {
    vec!["-s".to_string(), "{script}".to_string()]
}

fn default_benign_stderr() -> Vec<String> {
    vec!["Invalid type of WM_NAME property".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_image_pipeline() -> PipelineConfig {
    PipelineConfig {
        script: "higgsfield_image.ascr".to_string(),
        refresh_script: Some("higgsfield_refresh.ascr".to_string()),
        expected_artifacts: 4,
        artifact_extension: ".png".to_string(),
        abort_flags: Vec::new(),
        default_prompt: String::new(),
    }
}

fn default_video_pipeline() -> PipelineConfig {
    PipelineConfig {
        script: "RunwayVideo.ascr".to_string(),
        refresh_script: None,
        expected_artifacts: 2,
        artifact_extension: ".mp4".to_string(),
        abort_flags: vec!["Issue.txt".to_string(), "PromptViolation.txt".to_string()],
        default_prompt: "Dynamic Motion".to_string(),
    }
}
