//! Inbox ingestion: watch, debounce, promote.

pub mod debounce;
pub mod promote;
pub mod readiness;
pub mod watcher;

pub use debounce::Debouncer;
pub use promote::{promote, staging_dir, IngestError, PromoteOutcome, STAGING_SUFFIX};
pub use readiness::{ready_job, ReadyJob, PROMPT_EXTENSION, READY_MARKER};
pub use watcher::{FsChange, FsEvent, InboxWatcher, WatchRoot};

use crate::config::Settings;
use crate::jobs::{JobKey, JobKind};
use crate::queue::ActiveJobs;
use crate::runtime::logging::{log_error, log_info, log_warn};
use crate::runtime::FleetPaths;
use std::time::{Duration, Instant};

/// Turns inbox activity into promoted job keys. Driven by [`Ingestor::tick`] so time is
/// always supplied by the caller.
pub struct Ingestor {
    paths: FleetPaths,
    watcher: InboxWatcher,
    debouncer: Debouncer<JobKey, ReadyJob>,
    active: ActiveJobs,
}

impl Ingestor {
    pub fn new(
        paths: FleetPaths,
        watcher: InboxWatcher,
        quiet_period: Duration,
        active: ActiveJobs,
    ) -> Self {
        Self {
            paths,
            watcher,
            debouncer: Debouncer::new(quiet_period),
            active,
        }
    }

    pub fn from_settings(
        paths: FleetPaths,
        settings: &Settings,
        kinds: &[JobKind],
        active: ActiveJobs,
    ) -> Self {
        let roots = kinds
            .iter()
            .map(|kind| WatchRoot {
                kind: *kind,
                dir: paths.inbox_dir(*kind),
            })
            .collect();
        let watcher = InboxWatcher::new(
            roots,
            settings.policy.inbox_depth,
            settings.policy.write_stability(),
        );
        Self::new(paths, watcher, settings.policy.debounce_quiet_period(), active)
    }

    pub fn pending_timers(&self) -> usize {
        self.debouncer.len()
    }

    /// Polls the inboxes, (re)arms debounce timers and promotes every job whose quiet period
    /// has elapsed. Returns the keys to enqueue, in promotion order.
    pub fn tick(&mut self, now: Instant) -> Vec<JobKey> {
        for event in self.watcher.poll(now) {
            let Some(ready) = ready_job(&event) else {
                continue;
            };
            let key = ready.key.clone();
            if self.active.contains(&key) {
                log_info(
                    &self.paths,
                    "ingest.ignored_active",
                    &format!("{key}: already queued or processing"),
                );
                continue;
            }
            if self.debouncer.arm(key.clone(), ready, now) {
                log_info(&self.paths, "ingest.debounce.reset", &format!("{key}: timer reset"));
            } else {
                log_info(&self.paths, "ingest.debounce.armed", &format!("{key}: ready signal"));
            }
        }

        let mut promoted = Vec::new();
        for (key, ready) in self.debouncer.take_due(now) {
            if self.active.contains(&key) {
                continue;
            }
            match promote(&self.paths, &ready) {
                Ok(PromoteOutcome::Moved(target)) => {
                    log_info(
                        &self.paths,
                        "ingest.promoted",
                        &format!("{key}: moved to {}", target.display()),
                    );
                    promoted.push(key);
                }
                Ok(PromoteOutcome::AlreadyRelocated(_)) => {
                    log_info(
                        &self.paths,
                        "ingest.already_relocated",
                        &format!("{key}: processing directory exists, enqueueing"),
                    );
                    promoted.push(key);
                }
                Ok(PromoteOutcome::SourceMissing) => {
                    log_warn(
                        &self.paths,
                        "ingest.source_missing",
                        &format!("{key}: source vanished before promotion"),
                    );
                }
                Err(err) => {
                    log_error(&self.paths, "ingest.promote_failed", &format!("{key}: {err}"));
                }
            }
        }
        promoted
    }

    /// Earliest moment a pending timer can fire.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }
}
