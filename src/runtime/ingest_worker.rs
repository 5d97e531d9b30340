use super::worker_primitives::sleep_with_stop;
use super::{FleetPaths, WorkerEvent};
use crate::config::Settings;
use crate::ingest::Ingestor;
use crate::jobs::{JobKey, JobKind};
use crate::queue::ActiveJobs;
use crate::shared::time::now_secs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

pub const INGEST_WORKER_ID: &str = "ingest_worker";

pub struct IngestWorkerContext {
    pub paths: FleetPaths,
    pub settings: Settings,
    pub kinds: Vec<JobKind>,
    pub active: ActiveJobs,
    pub jobs: Sender<JobKey>,
    pub events: Sender<WorkerEvent>,
    pub stop: Arc<AtomicBool>,
}

pub fn run_ingest_worker(ctx: IngestWorkerContext) {
    let IngestWorkerContext {
        paths,
        settings,
        kinds,
        active,
        jobs,
        events,
        stop,
    } = ctx;
    let _ = events.send(WorkerEvent::Started {
        worker_id: INGEST_WORKER_ID.to_string(),
        at: now_secs(),
    });

    let mut ingestor = Ingestor::from_settings(paths, &settings, &kinds, active);
    let scan_interval = settings.policy.inbox_scan_interval();
    while !stop.load(Ordering::Relaxed) {
        for key in ingestor.tick(Instant::now()) {
            if jobs.send(key).is_err() {
                let _ = events.send(WorkerEvent::Error {
                    worker_id: INGEST_WORKER_ID.to_string(),
                    at: now_secs(),
                    message: "queue worker is gone".to_string(),
                    fatal: true,
                });
                return;
            }
        }
        let _ = events.send(WorkerEvent::Heartbeat {
            worker_id: INGEST_WORKER_ID.to_string(),
            at: now_secs(),
        });
        let nap = ingestor
            .next_deadline()
            .map(|due| due.saturating_duration_since(Instant::now()).min(scan_interval))
            .unwrap_or(scan_interval);
        if !sleep_with_stop(&stop, nap) {
            break;
        }
    }

    let _ = events.send(WorkerEvent::Stopped {
        worker_id: INGEST_WORKER_ID.to_string(),
        at: now_secs(),
    });
}
