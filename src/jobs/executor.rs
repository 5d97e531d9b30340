//! One work item through the attempt cycle.
//!
//! The download, flags and stage directories are shared by every invocation of a kind.
//! Callers must guarantee that only one executor runs at a time.

use super::attempt::{AttemptCycle, AttemptError, CycleFailure};
use super::layout::{ItemSource, JobDir, WorkItem, PROMPT_MAP_FILE};
use super::profile::{ExecutionPolicy, PipelineProfile};
use super::waiter::{wait_for_artifacts, ArtifactTarget};
use super::JobIdentity;
use crate::engine::{ActionRequest, ActionRunner};
use crate::runtime::logging::{log_info, log_warn};
use crate::runtime::FleetPaths;
use crate::shared::fs_ops::{empty_dir, is_hidden_name, move_path};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

pub const ENV_JOB_ID: &str = "RF_JOB_ID";
pub const ENV_PROMPT: &str = "RF_PROMPT";
pub const ENV_INDEX: &str = "RF_INDEX";
pub const ENV_PROJECT_NAME: &str = "RF_PROJECT_NAME";
pub const ENV_IMAGE_NAME: &str = "RF_IMAGE_NAME";
pub const ENV_FULL_JOB_PATH: &str = "RF_FULL_JOB_PATH";
pub const ENV_DOWNLOAD_DIR: &str = "RF_DOWNLOAD_DIR";
pub const ENV_FLAGS_DIR: &str = "RF_FLAGS_DIR";

pub struct ItemExecutor<'a> {
    paths: &'a FleetPaths,
    profile: &'a PipelineProfile,
    policy: ExecutionPolicy,
    runner: &'a dyn ActionRunner,
    stop: &'a AtomicBool,
}

impl<'a> ItemExecutor<'a> {
    pub fn new(
        paths: &'a FleetPaths,
        profile: &'a PipelineProfile,
        policy: ExecutionPolicy,
        runner: &'a dyn ActionRunner,
        stop: &'a AtomicBool,
    ) -> Self {
        Self {
            paths,
            profile,
            policy,
            runner,
            stop,
        }
    }

    /// Runs the item until it produces takes or the attempt budget is spent. On success the
    /// takes are in the job's output area and the item's marker exists. Returns the take
    /// file names.
    pub fn execute(
        &self,
        identity: &JobIdentity,
        job: &JobDir,
        item: &WorkItem,
    ) -> Result<Vec<String>, CycleFailure> {
        let label = format!("{}:{}", identity.job_id, item.name);
        AttemptCycle::new(self.policy.max_attempts).run(
            |attempt| {
                if attempt > 1 {
                    self.refresh_engine(&label);
                }
            },
            |attempt| {
                log_info(
                    self.paths,
                    "attempt.started",
                    &format!("{label} attempt {attempt}/{}", self.policy.max_attempts),
                );
                self.attempt(identity, job, item, &label)
            },
            |attempt, err| {
                log_warn(
                    self.paths,
                    "attempt.failed",
                    &format!(
                        "{label} attempt {attempt}/{} failed: {err}",
                        self.policy.max_attempts
                    ),
                );
            },
        )
    }

    fn refresh_engine(&self, label: &str) {
        let Some(script) = &self.profile.refresh_script else {
            return;
        };
        let request = ActionRequest::new(format!("{label}:refresh"), script)
            .with_timeout(self.policy.refresh_timeout);
        if let Err(err) = self.runner.run(&request) {
            log_warn(
                self.paths,
                "attempt.refresh_failed",
                &format!("{label}: refresh ignored: {err}"),
            );
        }
    }

    fn attempt(
        &self,
        identity: &JobIdentity,
        job: &JobDir,
        item: &WorkItem,
        label: &str,
    ) -> Result<Vec<String>, AttemptError> {
        clear_scratch(&self.profile.downloads_dir)?;
        clear_scratch(&self.profile.flags_dir)?;
        let cwd = self.prepare_stage(job, item)?;

        let mut request = ActionRequest::new(label, &self.profile.script)
            .with_timeout(self.policy.action_timeout)
            .with_env(ENV_JOB_ID, identity.job_id.clone())
            .with_env(ENV_PROMPT, item.prompt())
            .with_env(
                ENV_DOWNLOAD_DIR,
                self.profile.downloads_dir.display().to_string(),
            )
            .with_env(ENV_FLAGS_DIR, self.profile.flags_dir.display().to_string());
        request = match &item.source {
            ItemSource::PromptLine { index, .. } => request.with_env(ENV_INDEX, index.to_string()),
            ItemSource::Image { path, .. } => request
                .with_env(ENV_PROJECT_NAME, identity.source_name.clone())
                .with_env(ENV_IMAGE_NAME, item.name.clone())
                .with_env(ENV_FULL_JOB_PATH, path.display().to_string()),
        };
        if let Some(cwd) = cwd {
            request = request.with_cwd(cwd);
        }

        let report = self.runner.run(&request)?;
        log_info(
            self.paths,
            "attempt.action_finished",
            &format!("{label} engine exited in {}ms", report.elapsed.as_millis()),
        );

        let raised = self.profile.abort_flags.raised(&present_flags(&self.profile.flags_dir)?);
        if !raised.is_empty() {
            return Err(AttemptError::Flagged { flags: raised });
        }

        let target = ArtifactTarget {
            dir: self.profile.downloads_dir.clone(),
            count: self.profile.expected_artifacts,
            extension: self.profile.artifact_extension.clone(),
        };
        let files = wait_for_artifacts(&target, self.policy.wait, self.stop, self.paths)?;
        let takes = self.relocate_takes(job, item, files)?;
        job.mark_done(&item.name)
            .map_err(|source| io_err(&job.marker_path(&item.name), source))?;
        log_info(
            self.paths,
            "item.done",
            &format!("{label} committed {} take(s)", takes.len()),
        );
        Ok(takes)
    }

    /// Clears the shared video stage and seeds it with the item's image and the prompt map.
    fn prepare_stage(&self, job: &JobDir, item: &WorkItem) -> Result<Option<PathBuf>, AttemptError> {
        let (Some(stage), ItemSource::Image { path, .. }) = (&self.profile.stage_dir, &item.source)
        else {
            return Ok(None);
        };
        clear_scratch(stage)?;
        let staged = stage.join(&item.name);
        fs::copy(path, &staged).map_err(|source| io_err(&staged, source))?;
        let prompt_map = job.prompt_map_path();
        if prompt_map.is_file() {
            let staged_map = stage.join(PROMPT_MAP_FILE);
            fs::copy(&prompt_map, &staged_map).map_err(|source| io_err(&staged_map, source))?;
        }
        Ok(Some(stage.clone()))
    }

    fn relocate_takes(
        &self,
        job: &JobDir,
        item: &WorkItem,
        mut files: Vec<PathBuf>,
    ) -> Result<Vec<String>, AttemptError> {
        let output = job.output_dir();
        fs::create_dir_all(&output).map_err(|source| io_err(&output, source))?;
        files.sort();
        let mut takes = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let name = item.take_file_name(index + 1, &self.profile.artifact_extension);
            let target = output.join(&name);
            move_path(file, &target).map_err(|source| io_err(&target, source))?;
            takes.push(name);
        }
        Ok(takes)
    }
}

fn clear_scratch(dir: &Path) -> Result<(), AttemptError> {
    empty_dir(dir).map_err(|source| io_err(dir, source))
}

fn present_flags(dir: &Path) -> Result<Vec<String>, AttemptError> {
    let io = |source| io_err(dir, source);
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        if let Some(name) = entry.file_name().to_str() {
            if !is_hidden_name(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn io_err(path: &Path, source: std::io::Error) -> AttemptError {
    AttemptError::Io {
        path: path.display().to_string(),
        source,
    }
}
