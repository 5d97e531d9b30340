use super::ingest_worker::{run_ingest_worker, IngestWorkerContext, INGEST_WORKER_ID};
use super::queue_worker::{run_queue_worker, QueueWorkerContext, QUEUE_WORKER_ID};
use super::recovery::recover_processing_jobs;
use super::status::{apply_worker_event, save_status, DaemonStatus};
use super::{
    append_runtime_log, bootstrap_fleet_paths, log_info, log_warn, FleetPaths, LogLevel,
    RuntimeError, WorkerEvent,
};
use crate::config::Settings;
use crate::engine::{reap_stale_processes, ProcessActionRunner};
use crate::jobs::JobKey;
use crate::queue::ActiveJobs;
use crate::shared::time::now_secs;
use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const EVENT_POLL: Duration = Duration::from_millis(50);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the daemon in the foreground until the stop file appears.
///
/// Startup order: directories, stale engine processes, crash recovery, then the queue
/// worker and finally the inbox watcher, so recovered jobs are queued ahead of any new
/// arrival.
pub fn run_daemon(paths: &FleetPaths, settings: Settings) -> Result<(), RuntimeError> {
    let kinds = settings.enabled_kinds();
    bootstrap_fleet_paths(paths, &kinds)?;

    let stop_path = paths.stop_signal_path();
    if stop_path.exists() {
        let _ = fs::remove_file(&stop_path);
    }
    if settings.action.reap_stale_processes {
        reap_stale_processes(&settings.action.binary, paths);
    }
    let recovered = recover_processing_jobs(paths, &kinds)?;

    let mut status = DaemonStatus {
        running: true,
        pid: Some(std::process::id()),
        worker_id: paths.worker_id.clone(),
        started_at: Some(now_secs()),
        ..DaemonStatus::default()
    };
    status.refresh_activity(paths.pause_file().exists());
    save_status(paths, &status)?;
    log_info(
        paths,
        "daemon.started",
        &format!(
            "pid={} kinds={} recovered={}",
            std::process::id(),
            kinds
                .iter()
                .map(|kind| kind.as_str())
                .collect::<Vec<_>>()
                .join(","),
            recovered.len()
        ),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (events_tx, events_rx) = mpsc::channel::<WorkerEvent>();
    let (jobs_tx, jobs_rx) = mpsc::channel::<JobKey>();
    let active = ActiveJobs::default();
    let mut running = BTreeSet::new();
    let mut handles = Vec::new();

    let queue_ctx = QueueWorkerContext {
        paths: paths.clone(),
        settings: settings.clone(),
        active: active.clone(),
        initial: recovered,
        jobs: jobs_rx,
        events: events_tx.clone(),
        stop: stop.clone(),
    };
    handles.push(spawn(QUEUE_WORKER_ID, move || {
        let runner = ProcessActionRunner::from_settings(
            &queue_ctx.settings,
            queue_ctx.paths.clone(),
            queue_ctx.stop.clone(),
        );
        run_queue_worker(queue_ctx, &runner);
    })?);
    running.insert(QUEUE_WORKER_ID.to_string());

    let ingest_ctx = IngestWorkerContext {
        paths: paths.clone(),
        settings,
        kinds,
        active,
        jobs: jobs_tx,
        events: events_tx,
        stop: stop.clone(),
    };
    match spawn(INGEST_WORKER_ID, move || run_ingest_worker(ingest_ctx)) {
        Ok(handle) => {
            handles.push(handle);
            running.insert(INGEST_WORKER_ID.to_string());
        }
        Err(err) => {
            stop.store(true, Ordering::Relaxed);
            for handle in handles {
                let _ = handle.join();
            }
            return Err(err);
        }
    }

    while !stop.load(Ordering::Relaxed) {
        if stop_path.exists() {
            stop.store(true, Ordering::Relaxed);
            log_info(paths, "daemon.stop.signal", "stop file detected");
            break;
        }
        match events_rx.recv_timeout(EVENT_POLL) {
            Ok(event) => handle_worker_event(paths, &mut status, &mut running, event),
            Err(RecvTimeoutError::Timeout) => {
                let before = status.activity;
                status.refresh_activity(paths.pause_file().exists());
                if status.activity != before {
                    let _ = save_status(paths, &status);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if running.is_empty() {
            log_warn(paths, "daemon.workers_exited", "all workers exited");
            break;
        }
    }
    stop.store(true, Ordering::Relaxed);

    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    while !running.is_empty() && Instant::now() < deadline {
        match events_rx.recv_timeout(EVENT_POLL) {
            Ok(event) => handle_worker_event(paths, &mut status, &mut running, event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if !running.is_empty() {
        let message = format!(
            "shutdown timeout waiting for workers: {}",
            running.iter().cloned().collect::<Vec<_>>().join(",")
        );
        log_warn(paths, "daemon.shutdown.timeout", &message);
        status.last_error = Some(message);
    }
    for handle in handles {
        let _ = handle.join();
    }

    status.running = false;
    status.pid = None;
    status.current_job = None;
    status.stopped_at = Some(now_secs());
    status.refresh_activity(paths.pause_file().exists());
    save_status(paths, &status)?;
    let _ = fs::remove_file(&stop_path);
    log_info(paths, "daemon.stopped", "runtime stopped cleanly");
    Ok(())
}

/// Asks a running daemon to stop by dropping the stop file.
pub fn signal_stop(paths: &FleetPaths) -> Result<(), RuntimeError> {
    let path = paths.stop_signal_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RuntimeError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    fs::write(&path, b"").map_err(|source| RuntimeError::WriteState {
        path: path.display().to_string(),
        source,
    })
}

fn spawn<F>(worker: &str, body: F) -> Result<thread::JoinHandle<()>, RuntimeError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(worker.to_string())
        .spawn(body)
        .map_err(|source| RuntimeError::Spawn {
            worker: worker.to_string(),
            source,
        })
}

fn handle_worker_event(
    paths: &FleetPaths,
    status: &mut DaemonStatus,
    running: &mut BTreeSet<String>,
    event: WorkerEvent,
) {
    if let Some(log) = apply_worker_event(status, running, event) {
        append_runtime_log(paths, log.level, log.event, &log.message);
    }
    status.refresh_activity(paths.pause_file().exists());
    if let Err(err) = save_status(paths, status) {
        append_runtime_log(paths, LogLevel::Warn, "daemon.status_failed", &err.to_string());
    }
}
