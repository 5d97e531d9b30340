use super::RuntimeError;
use crate::config::Settings;
use crate::jobs::JobKind;
use std::fs;
use std::path::{Path, PathBuf};

/// Every filesystem location the daemon reads or writes, derived once from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetPaths {
    pub sync_root: PathBuf,
    pub runtime_root: PathBuf,
    pub worker_id: String,
}

impl FleetPaths {
    pub fn new(
        sync_root: impl Into<PathBuf>,
        runtime_root: impl Into<PathBuf>,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            sync_root: sync_root.into(),
            runtime_root: runtime_root.into(),
            worker_id: worker_id.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.sync_root,
            &settings.runtime_root,
            settings.worker_id.clone(),
        )
    }

    pub fn required_directories(&self, kinds: &[JobKind]) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.downloads_dir(),
            self.daemon_dir(),
            self.runtime_root.join("logs"),
        ];
        for kind in kinds {
            dirs.push(self.inbox_dir(*kind));
            dirs.push(self.outbox_dir(*kind));
            dirs.push(self.processing_dir(*kind));
            dirs.push(self.flags_dir(*kind));
            dirs.push(self.stage_dir(*kind));
        }
        dirs
    }

    pub fn inbox_dir(&self, kind: JobKind) -> PathBuf {
        self.sync_root
            .join(kind.as_str())
            .join("assigned")
            .join(&self.worker_id)
            .join("inbox")
    }

    pub fn outbox_dir(&self, kind: JobKind) -> PathBuf {
        self.sync_root.join(kind.as_str()).join("outbox")
    }

    pub fn tool_script(&self, kind: JobKind, script: &str) -> PathBuf {
        self.sync_root.join(kind.as_str()).join("tools").join(script)
    }

    pub fn processing_dir(&self, kind: JobKind) -> PathBuf {
        self.runtime_root.join("processing").join(kind.as_str())
    }

    pub fn job_dir(&self, kind: JobKind, name: &str) -> PathBuf {
        self.processing_dir(kind).join(name)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.runtime_root.join("downloads/general")
    }

    pub fn flags_dir(&self, kind: JobKind) -> PathBuf {
        self.runtime_root.join("flags").join(kind.as_str())
    }

    pub fn stage_dir(&self, kind: JobKind) -> PathBuf {
        self.runtime_root.join("stage").join(kind.as_str())
    }

    pub fn pause_file(&self) -> PathBuf {
        self.runtime_root.join("PAUSED")
    }

    pub fn daemon_dir(&self) -> PathBuf {
        self.runtime_root.join("daemon")
    }

    pub fn status_path(&self) -> PathBuf {
        self.daemon_dir().join("status.json")
    }

    pub fn stop_signal_path(&self) -> PathBuf {
        self.daemon_dir().join("stop")
    }

    pub fn runtime_log_path(&self) -> PathBuf {
        self.runtime_root.join("logs/node.log")
    }
}

pub fn bootstrap_fleet_paths(paths: &FleetPaths, kinds: &[JobKind]) -> Result<(), RuntimeError> {
    for path in paths.required_directories(kinds) {
        create_dir(&path)?;
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), RuntimeError> {
    fs::create_dir_all(path).map_err(|source| RuntimeError::CreateDir {
        path: path.display().to_string(),
        source,
    })
}
