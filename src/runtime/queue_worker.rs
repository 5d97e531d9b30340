use super::worker_primitives::sleep_with_stop;
use super::{log_error, log_info, log_warn, FleetPaths, WorkerEvent};
use crate::config::Settings;
use crate::engine::ActionRunner;
use crate::jobs::{JobDriver, JobError, JobKey, JobOutcome};
use crate::queue::{ActiveJobs, DrainStep, JobQueue, JobRunner, PauseSentinel, PauseSignal};
use crate::shared::fs_ops::remove_tree_if_exists;
use crate::shared::time::now_secs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const QUEUE_WORKER_ID: &str = "queue_worker";
const IDLE_HEARTBEAT: Duration = Duration::from_secs(1);
const WAIT_STEP: Duration = Duration::from_millis(200);

/// Runs jobs through [`JobDriver`] and removes their processing directory once published.
pub struct DriverJobRunner<'a> {
    pub paths: &'a FleetPaths,
    pub settings: &'a Settings,
    pub runner: &'a dyn ActionRunner,
    pub pause: &'a dyn PauseSignal,
    pub stop: &'a AtomicBool,
}

impl JobRunner for DriverJobRunner<'_> {
    fn run_job(&mut self, key: &JobKey) -> Result<JobOutcome, JobError> {
        JobDriver::new(self.paths, self.settings, self.runner, self.pause, self.stop).run(key)
    }

    fn cleanup(&mut self, key: &JobKey) -> std::io::Result<()> {
        remove_tree_if_exists(&self.paths.job_dir(key.kind, &key.name))
    }
}

pub struct QueueWorkerContext {
    pub paths: FleetPaths,
    pub settings: Settings,
    pub active: ActiveJobs,
    /// Recovered keys, enqueued before anything from `jobs`.
    pub initial: Vec<JobKey>,
    pub jobs: Receiver<JobKey>,
    pub events: Sender<WorkerEvent>,
    pub stop: Arc<AtomicBool>,
}

/// The single worker: owns the queue and drains it one job at a time until `stop` is raised.
pub fn run_queue_worker(ctx: QueueWorkerContext, runner: &dyn ActionRunner) {
    let QueueWorkerContext {
        paths,
        settings,
        active,
        initial,
        jobs,
        events,
        stop,
    } = ctx;
    let _ = events.send(WorkerEvent::Started {
        worker_id: QUEUE_WORKER_ID.to_string(),
        at: now_secs(),
    });

    let pause = PauseSentinel::new(paths.pause_file());
    let mut queue = JobQueue::new(active);
    for key in initial {
        enqueue(&paths, &mut queue, key);
    }
    publish_queue(&events, &queue);

    let mut job_runner = DriverJobRunner {
        paths: &paths,
        settings: &settings,
        runner,
        pause: &pause,
        stop: stop.as_ref(),
    };
    let mut jobs_open = true;
    while !stop.load(Ordering::Relaxed) {
        if let Some(head) = queue.head().filter(|_| !pause.is_paused()) {
            let _ = events.send(WorkerEvent::JobStarted {
                key: head.to_string(),
                at: now_secs(),
            });
        }
        let step = queue.drain_once(&mut job_runner, &pause);
        report_step(&paths, &events, &step);
        publish_queue(&events, &queue);

        let wait = step.retry_after(
            settings.policy.pause_backoff(),
            settings.policy.drain_yield(),
        );
        if matches!(step, DrainStep::Idle) {
            let _ = events.send(WorkerEvent::Heartbeat {
                worker_id: QUEUE_WORKER_ID.to_string(),
                at: now_secs(),
            });
        }
        if !jobs_open {
            if !sleep_with_stop(&stop, wait.unwrap_or(IDLE_HEARTBEAT)) {
                break;
            }
            continue;
        }
        jobs_open = wait_for_jobs(&paths, &mut queue, &jobs, &events, &stop, wait);
    }

    let _ = events.send(WorkerEvent::Stopped {
        worker_id: QUEUE_WORKER_ID.to_string(),
        at: now_secs(),
    });
}

/// Accepts new keys until the retry delay elapses. With no delay, returns on the first
/// arrival or after one idle heartbeat interval. Returns false once the sender is gone.
fn wait_for_jobs(
    paths: &FleetPaths,
    queue: &mut JobQueue,
    jobs: &Receiver<JobKey>,
    events: &Sender<WorkerEvent>,
    stop: &AtomicBool,
    delay: Option<Duration>,
) -> bool {
    let deadline = Instant::now() + delay.unwrap_or(IDLE_HEARTBEAT);
    loop {
        if stop.load(Ordering::Relaxed) {
            return true;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        match jobs.recv_timeout(remaining.min(WAIT_STEP)) {
            Ok(key) => {
                enqueue(paths, queue, key);
                while let Ok(more) = jobs.try_recv() {
                    enqueue(paths, queue, more);
                }
                publish_queue(events, queue);
                if delay.is_none() {
                    return true;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

fn enqueue(paths: &FleetPaths, queue: &mut JobQueue, key: JobKey) {
    let label = key.to_string();
    if queue.enqueue(key) {
        log_info(paths, "queue.enqueued", &label);
    } else {
        log_info(paths, "queue.duplicate", &format!("{label} already active"));
    }
}

fn publish_queue(events: &Sender<WorkerEvent>, queue: &JobQueue) {
    let _ = events.send(WorkerEvent::QueueChanged {
        pending: queue.pending().map(ToString::to_string).collect(),
    });
}

fn report_step(paths: &FleetPaths, events: &Sender<WorkerEvent>, step: &DrainStep) {
    let settled = |key: &JobKey, outcome: &str| {
        let _ = events.send(WorkerEvent::JobSettled {
            key: key.to_string(),
            outcome: outcome.to_string(),
            at: now_secs(),
        });
    };
    match step {
        DrainStep::Paused => log_info(paths, "queue.paused", "pause sentinel present"),
        DrainStep::Idle => {}
        DrainStep::Finished { key, cleanup_error } => {
            if let Some(err) = cleanup_error {
                log_warn(
                    paths,
                    "queue.cleanup_failed",
                    &format!("{key}: published but processing directory remains: {err}"),
                );
            }
            settled(key, "finished");
        }
        DrainStep::Partial(key) => {
            log_info(paths, "queue.partial", &format!("{key}: kept at head"));
            settled(key, "partial");
        }
        DrainStep::Abandoned { key, error } => {
            log_error(paths, "queue.abandoned", &format!("{key}: {error}"));
            settled(key, "abandoned");
        }
    }
}
