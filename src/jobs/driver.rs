use super::executor::ItemExecutor;
use super::layout::{discover_items, JobDir};
use super::profile::{ExecutionPolicy, PipelineProfile};
use super::{parse_job_name, JobIdentity, JobKey};
use crate::config::Settings;
use crate::engine::ActionRunner;
use crate::queue::PauseSignal;
use crate::runtime::logging::{log_error, log_info, log_warn};
use crate::runtime::FleetPaths;
use crate::shared::fs_ops::{copy_tree, empty_dir};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every item was attempted and the job is in the outbox.
    Finished,
    /// Stopped between items; completed items carry markers.
    Partial,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job name `{name}` does not follow channel__jobId__name")]
    InvalidName { name: String },
    #[error("job io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to publish job to {path}: {source}")]
    Publish {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> JobError {
    JobError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn partial(job: &JobDir) -> Result<JobOutcome, JobError> {
    job.rewind_pass_counter()
        .map_err(|source| io_err(&job.root, source))?;
    Ok(JobOutcome::Partial)
}

/// Walks a job's items, then publishes it. Safe to re-run on the same directory at any
/// point: finished items are skipped and publishing overwrites with identical content.
pub struct JobDriver<'a> {
    paths: &'a FleetPaths,
    settings: &'a Settings,
    runner: &'a dyn ActionRunner,
    pause: &'a dyn PauseSignal,
    stop: &'a AtomicBool,
}

impl<'a> JobDriver<'a> {
    pub fn new(
        paths: &'a FleetPaths,
        settings: &'a Settings,
        runner: &'a dyn ActionRunner,
        pause: &'a dyn PauseSignal,
        stop: &'a AtomicBool,
    ) -> Self {
        Self {
            paths,
            settings,
            runner,
            pause,
            stop,
        }
    }

    pub fn run(&self, key: &JobKey) -> Result<JobOutcome, JobError> {
        let job = JobDir::new(self.paths.job_dir(key.kind, &key.name));
        if !job.root.is_dir() {
            log_warn(
                self.paths,
                "job.missing",
                &format!("{key}: processing directory is gone, nothing to do"),
            );
            return Ok(JobOutcome::Finished);
        }
        let identity = parse_job_name(&key.name, key.kind).ok_or_else(|| JobError::InvalidName {
            name: key.name.clone(),
        })?;

        job.normalize().map_err(|source| io_err(&job.root, source))?;
        let passes = job
            .bump_pass_counter()
            .map_err(|source| io_err(&job.root, source))?;
        let exhausted = passes > self.settings.policy.max_job_passes;

        let profile = PipelineProfile::from_settings(key.kind, self.settings, self.paths);
        let prompts = job.load_prompt_map().unwrap_or_else(|err| {
            log_warn(
                self.paths,
                "job.prompt_map_invalid",
                &format!("{key}: ignoring prompt map: {err}"),
            );
            Default::default()
        });
        let items = discover_items(key.kind, &job, &prompts, &profile.default_prompt)
            .map_err(|source| io_err(&job.input_dir(), source))?;
        log_info(
            self.paths,
            "job.started",
            &format!(
                "{key}: pass {passes}, {} item(s), date={}",
                items.len(),
                identity.date
            ),
        );

        let executor = ItemExecutor::new(
            self.paths,
            &profile,
            ExecutionPolicy::from_policy(&self.settings.policy),
            self.runner,
            self.stop,
        );
        for item in &items {
            if job.is_done(&item.name) {
                log_info(self.paths, "item.skipped", &format!("{key}: {} already done", item.name));
                continue;
            }
            if exhausted {
                log_warn(
                    self.paths,
                    "item.abandoned",
                    &format!(
                        "{key}: {} left unfinished after {} passes",
                        item.name, self.settings.policy.max_job_passes
                    ),
                );
                continue;
            }
            if self.stop.load(Ordering::Relaxed) {
                log_info(self.paths, "job.interrupted", &format!("{key}: stop requested"));
                return partial(&job);
            }
            if self.pause.is_paused() {
                log_info(
                    self.paths,
                    "job.paused",
                    &format!("{key}: paused before {}", item.name),
                );
                return partial(&job);
            }
            if let Err(failure) = executor.execute(&identity, &job, item) {
                log_error(
                    self.paths,
                    "item.failed",
                    &format!("{key}: {}: {failure}", item.name),
                );
                if failure.last.is_interrupt() {
                    return partial(&job);
                }
            }
        }

        let published = self.finalize(&identity, &job, &profile)?;
        log_info(
            self.paths,
            "job.finished",
            &format!("{key}: published to {}", published.display()),
        );
        Ok(JobOutcome::Finished)
    }

    /// Copies the whole job directory into the outbox. Deleting the processing directory
    /// is left to the caller, after this returns.
    fn finalize(
        &self,
        identity: &JobIdentity,
        job: &JobDir,
        profile: &PipelineProfile,
    ) -> Result<PathBuf, JobError> {
        job.normalize().map_err(|source| io_err(&job.root, source))?;
        let target = self
            .paths
            .outbox_dir(identity.kind)
            .join(identity.outbox_folder_name());
        copy_tree(&job.root, &target).map_err(|source| JobError::Publish {
            path: target.display().to_string(),
            source,
        })?;
        if let Some(stage) = &profile.stage_dir {
            empty_dir(stage).map_err(|source| io_err(stage, source))?;
        }
        Ok(target)
    }
}
