use super::waiter::WaitPolicy;
use super::JobKind;
use crate::config::{PolicyConfig, Settings};
use crate::runtime::FleetPaths;
use std::path::PathBuf;
use std::time::Duration;

/// Which flag files abort an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortFlags {
    Any,
    Named(Vec<String>),
}

impl AbortFlags {
    pub fn from_names(names: &[String]) -> Self {
        if names.is_empty() {
            Self::Any
        } else {
            Self::Named(names.to_vec())
        }
    }

    /// The subset of `present` flag files that abort the attempt.
    pub fn raised(&self, present: &[String]) -> Vec<String> {
        match self {
            Self::Any => present.to_vec(),
            Self::Named(names) => present
                .iter()
                .filter(|flag| names.contains(flag))
                .cloned()
                .collect(),
        }
    }
}

/// Everything that differs between the two fixed pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineProfile {
    pub kind: JobKind,
    pub script: PathBuf,
    pub refresh_script: Option<PathBuf>,
    pub downloads_dir: PathBuf,
    pub flags_dir: PathBuf,
    pub abort_flags: AbortFlags,
    /// Shared per-kind stage the engine reads its input from. Video only.
    pub stage_dir: Option<PathBuf>,
    pub expected_artifacts: usize,
    pub artifact_extension: String,
    pub default_prompt: String,
}

impl PipelineProfile {
    pub fn from_settings(kind: JobKind, settings: &Settings, paths: &FleetPaths) -> Self {
        let pipeline = settings.pipeline(kind);
        Self {
            kind,
            script: paths.tool_script(kind, &pipeline.script),
            refresh_script: pipeline
                .refresh_script
                .as_deref()
                .map(|script| paths.tool_script(kind, script)),
            downloads_dir: paths.downloads_dir(),
            flags_dir: paths.flags_dir(kind),
            abort_flags: AbortFlags::from_names(&pipeline.abort_flags),
            stage_dir: match kind {
                JobKind::Video => Some(paths.stage_dir(kind)),
                JobKind::Image => None,
            },
            expected_artifacts: pipeline.expected_artifacts,
            artifact_extension: pipeline.artifact_extension.clone(),
            default_prompt: pipeline.default_prompt.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
    pub max_attempts: u32,
    pub action_timeout: Duration,
    pub refresh_timeout: Duration,
    pub wait: WaitPolicy,
}

impl ExecutionPolicy {
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self {
            max_attempts: policy.max_retries.saturating_add(1),
            action_timeout: policy.action_timeout(),
            refresh_timeout: policy.refresh_timeout(),
            wait: WaitPolicy {
                poll_interval: policy.artifact_poll_interval(),
                straggler_timeout: policy.straggler_timeout(),
                global_timeout: policy.action_timeout(),
            },
        }
    }
}
