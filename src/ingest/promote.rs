use super::readiness::{ReadyJob, PROMPT_EXTENSION};
use crate::jobs::JobKind;
use crate::runtime::FleetPaths;
use crate::shared::fs_ops::{move_path, remove_tree_if_exists};
use std::fs;
use std::path::{Path, PathBuf};

pub const STAGING_SUFFIX: &str = ".incoming";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to promote {from} to {to}: {source}")]
    Promote {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoteOutcome {
    Moved(PathBuf),
    /// The processing directory exists already (moved earlier, not yet queued).
    AlreadyRelocated(PathBuf),
    /// The inbox source vanished before the timer fired.
    SourceMissing,
}

/// Hidden sibling of a job directory used while a promotion is in flight.
pub fn staging_dir(paths: &FleetPaths, kind: JobKind, name: &str) -> PathBuf {
    paths
        .processing_dir(kind)
        .join(format!(".{name}{STAGING_SUFFIX}"))
}

/// Moves a ready job into the processing area. The source is first moved into a hidden
/// staging directory, which is then renamed into place, so the job directory appears
/// complete or not at all.
pub fn promote(paths: &FleetPaths, job: &ReadyJob) -> Result<PromoteOutcome, IngestError> {
    let target = paths.job_dir(job.key.kind, &job.key.name);
    if target.exists() {
        return Ok(PromoteOutcome::AlreadyRelocated(target));
    }
    if !job.source.exists() {
        return Ok(PromoteOutcome::SourceMissing);
    }

    let staging = staging_dir(paths, job.key.kind, &job.key.name);
    let fail = |to: &Path, source| IngestError::Promote {
        from: job.source.display().to_string(),
        to: to.display().to_string(),
        source,
    };
    remove_tree_if_exists(&staging).map_err(|err| fail(&staging, err))?;
    match job.key.kind {
        JobKind::Video => move_path(&job.source, &staging).map_err(|err| fail(&staging, err))?,
        JobKind::Image => {
            fs::create_dir_all(&staging).map_err(|err| fail(&staging, err))?;
            let staged = staging.join(format!("{}{PROMPT_EXTENSION}", job.key.name));
            move_path(&job.source, &staged).map_err(|err| fail(&staged, err))?;
        }
    }
    fs::rename(&staging, &target).map_err(|err| fail(&target, err))?;
    Ok(PromoteOutcome::Moved(target))
}
