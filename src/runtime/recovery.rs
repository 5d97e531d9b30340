use super::{log_info, log_warn, FleetPaths, RuntimeError};
use crate::ingest::STAGING_SUFFIX;
use crate::jobs::{JobKey, JobKind};
use crate::shared::fs_ops::{is_hidden_name, remove_tree_if_exists};
use std::fs;
use std::path::Path;

/// Lists every job directory left in the processing area, oldest name first. Promotions
/// interrupted after the move but before the final rename are completed first.
pub fn recover_processing_jobs(
    paths: &FleetPaths,
    kinds: &[JobKind],
) -> Result<Vec<JobKey>, RuntimeError> {
    let mut recovered = Vec::new();
    for kind in kinds {
        let processing = paths.processing_dir(*kind);
        finish_staged_promotions(paths, &processing)?;

        let mut names = Vec::new();
        for entry in read_dir(&processing)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_hidden_name(name) || !entry.path().is_dir() {
                continue;
            }
            names.push(name.to_string());
        }
        names.sort();
        for name in names {
            log_info(paths, "queue.recovered", &format!("{kind}/{name}"));
            recovered.push(JobKey::new(*kind, name));
        }
    }
    Ok(recovered)
}

fn finish_staged_promotions(paths: &FleetPaths, processing: &Path) -> Result<(), RuntimeError> {
    for entry in read_dir(processing)? {
        let file_name = entry.file_name();
        let Some(name) = file_name
            .to_str()
            .and_then(|name| name.strip_prefix('.'))
            .and_then(|name| name.strip_suffix(STAGING_SUFFIX))
        else {
            continue;
        };
        let staged = entry.path();
        let target = processing.join(name);
        let result = if name.is_empty() || target.exists() {
            remove_tree_if_exists(&staged)
        } else {
            fs::rename(&staged, &target)
        };
        match result {
            Ok(()) => log_info(
                paths,
                "ingest.staging_recovered",
                &format!("settled {}", staged.display()),
            ),
            Err(err) => log_warn(
                paths,
                "ingest.staging_recovery_failed",
                &format!("{}: {err}", staged.display()),
            ),
        }
    }
    Ok(())
}

fn read_dir(dir: &Path) -> Result<Vec<fs::DirEntry>, RuntimeError> {
    let map = |source| RuntimeError::Recovery {
        path: dir.display().to_string(),
        source,
    };
    fs::read_dir(dir)
        .map_err(map)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map)
}
