use super::worker_registry::{WorkerEvent, WorkerHealth, WorkerState};
use super::{FleetPaths, LogLevel, RuntimeError};
use crate::shared::fs_ops::atomic_write_file;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeActivity {
    #[default]
    Idle,
    Busy,
    Paused,
}

/// Snapshot written to `daemon/status.json` for operators and the `status` command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub worker_id: String,
    pub started_at: Option<i64>,
    pub stopped_at: Option<i64>,
    pub activity: NodeActivity,
    pub current_job: Option<String>,
    #[serde(default)]
    pub queue: Vec<String>,
    #[serde(default)]
    pub workers: BTreeMap<String, WorkerHealth>,
    pub last_error: Option<String>,
}

impl DaemonStatus {
    pub fn refresh_activity(&mut self, paused: bool) {
        self.activity = if paused {
            NodeActivity::Paused
        } else if self.current_job.is_some() {
            NodeActivity::Busy
        } else {
            NodeActivity::Idle
        };
    }
}

pub fn load_status(paths: &FleetPaths) -> Result<DaemonStatus, RuntimeError> {
    let path = paths.status_path();
    if !path.exists() {
        return Ok(DaemonStatus::default());
    }
    let raw = fs::read_to_string(&path).map_err(|source| RuntimeError::ReadState {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RuntimeError::ParseState {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_status(paths: &FleetPaths, status: &DaemonStatus) -> Result<(), RuntimeError> {
    let path = paths.status_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RuntimeError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let encoded = serde_json::to_vec_pretty(status).map_err(|source| RuntimeError::ParseState {
        path: path.display().to_string(),
        source,
    })?;
    atomic_write_file(&path, &encoded).map_err(|source| RuntimeError::WriteState {
        path: path.display().to_string(),
        source,
    })
}

pub struct EventLog {
    pub level: LogLevel,
    pub event: &'static str,
    pub message: String,
}

/// Folds one worker event into the status. `running` tracks workers that have not
/// reported `Stopped` yet.
pub fn apply_worker_event(
    status: &mut DaemonStatus,
    running: &mut BTreeSet<String>,
    event: WorkerEvent,
) -> Option<EventLog> {
    match event {
        WorkerEvent::Started { worker_id, at } => {
            let entry = status.workers.entry(worker_id.clone()).or_default();
            entry.state = WorkerState::Running;
            entry.last_heartbeat = Some(at);
            Some(EventLog {
                level: LogLevel::Info,
                event: "worker.started",
                message: worker_id,
            })
        }
        WorkerEvent::Heartbeat { worker_id, at } => {
            let entry = status.workers.entry(worker_id).or_default();
            if entry.state != WorkerState::Error {
                entry.state = WorkerState::Running;
            }
            entry.last_heartbeat = Some(at);
            None
        }
        WorkerEvent::JobStarted { key, .. } => {
            status.current_job = Some(key);
            None
        }
        WorkerEvent::JobSettled { key, outcome, .. } => {
            if status.current_job.as_deref() == Some(key.as_str()) {
                status.current_job = None;
            }
            Some(EventLog {
                level: LogLevel::Info,
                event: "queue.settled",
                message: format!("{key}: {outcome}"),
            })
        }
        WorkerEvent::QueueChanged { pending } => {
            status.queue = pending;
            None
        }
        WorkerEvent::Error {
            worker_id,
            at,
            message,
            fatal,
        } => {
            let entry = status.workers.entry(worker_id.clone()).or_default();
            entry.state = WorkerState::Error;
            entry.last_heartbeat = Some(at);
            entry.last_error = Some(message.clone());
            status.last_error = Some(message.clone());
            if fatal {
                running.remove(&worker_id);
            }
            Some(EventLog {
                level: if fatal { LogLevel::Error } else { LogLevel::Warn },
                event: "worker.error",
                message: format!("{worker_id}: {message}"),
            })
        }
        WorkerEvent::Stopped { worker_id, at } => {
            let entry = status.workers.entry(worker_id.clone()).or_default();
            if entry.state != WorkerState::Error {
                entry.state = WorkerState::Stopped;
            }
            entry.last_heartbeat = Some(at);
            running.remove(&worker_id);
            Some(EventLog {
                level: LogLevel::Info,
                event: "worker.stopped",
                message: worker_id,
            })
        }
    }
}
