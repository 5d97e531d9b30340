use crate::jobs::{JobError, JobKey, JobOutcome};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::PauseSignal;

/// Keys that are queued or being processed. Shared with ingestion so a job already in
/// flight is never promoted twice.
#[derive(Debug, Clone, Default)]
pub struct ActiveJobs {
    inner: Arc<Mutex<HashSet<JobKey>>>,
}

impl ActiveJobs {
    fn lock(&self) -> MutexGuard<'_, HashSet<JobKey>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns false when the key was already active.
    pub fn insert(&self, key: &JobKey) -> bool {
        self.lock().insert(key.clone())
    }

    pub fn remove(&self, key: &JobKey) -> bool {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// What the queue needs from the job pipeline.
pub trait JobRunner {
    fn run_job(&mut self, key: &JobKey) -> Result<JobOutcome, JobError>;
    /// Removes the job's processing directory after publication.
    fn cleanup(&mut self, key: &JobKey) -> std::io::Result<()>;
}

#[derive(Debug)]
pub enum DrainStep {
    Paused,
    Idle,
    Finished {
        key: JobKey,
        /// Set when the processing directory could not be removed; startup recovery will
        /// re-finalize it.
        cleanup_error: Option<String>,
    },
    /// Left at the head of the queue.
    Partial(JobKey),
    /// Dropped from the queue for this process lifetime.
    Abandoned { key: JobKey, error: JobError },
}

impl DrainStep {
    /// How long the worker waits before the next drain; `None` means until new work.
    pub fn retry_after(&self, pause_backoff: Duration, drain_yield: Duration) -> Option<Duration> {
        match self {
            Self::Paused => Some(pause_backoff),
            Self::Idle => None,
            Self::Finished { .. } | Self::Partial(_) | Self::Abandoned { .. } => Some(drain_yield),
        }
    }
}

/// FIFO of job keys processed one at a time. `&mut self` on [`JobQueue::drain_once`]
/// is the only guard needed: a drain cannot start while another is running.
#[derive(Debug, Default)]
pub struct JobQueue {
    pending: VecDeque<JobKey>,
    active: ActiveJobs,
}

impl JobQueue {
    pub fn new(active: ActiveJobs) -> Self {
        Self {
            pending: VecDeque::new(),
            active,
        }
    }

    pub fn active(&self) -> &ActiveJobs {
        &self.active
    }

    /// No-op (returns false) when the key is already active.
    pub fn enqueue(&mut self, key: JobKey) -> bool {
        if !self.active.insert(&key) {
            return false;
        }
        self.pending.push_back(key);
        true
    }

    pub fn head(&self) -> Option<&JobKey> {
        self.pending.front()
    }

    pub fn pending(&self) -> impl Iterator<Item = &JobKey> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Runs the head job once. The head is peeked, not popped, so a paused job keeps
    /// its position ahead of later arrivals.
    pub fn drain_once(&mut self, runner: &mut dyn JobRunner, pause: &dyn PauseSignal) -> DrainStep {
        if pause.is_paused() {
            return DrainStep::Paused;
        }
        let Some(key) = self.pending.front().cloned() else {
            return DrainStep::Idle;
        };

        match runner.run_job(&key) {
            Ok(JobOutcome::Partial) => DrainStep::Partial(key),
            Ok(JobOutcome::Finished) => {
                self.pop_head(&key);
                let cleanup_error = runner.cleanup(&key).err().map(|err| err.to_string());
                DrainStep::Finished { key, cleanup_error }
            }
            Err(error) => {
                self.pop_head(&key);
                DrainStep::Abandoned { key, error }
            }
        }
    }

    fn pop_head(&mut self, key: &JobKey) {
        self.pending.pop_front();
        self.active.remove(key);
    }
}
