//! Waiting for the engine's artifacts to land in the shared download directory.
//!
//! The engine may produce fewer takes than requested. Once the first matching file shows
//! up, a straggler window starts; when it closes, whatever has arrived is accepted. With
//! nothing at all, the wait fails at the global timeout.

use crate::runtime::logging::{log_info, log_warn};
use crate::runtime::FleetPaths;
use crate::shared::fs_ops::is_hidden_name;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("no {extension} artifacts after {waited_ms}ms (global timeout)")]
    GlobalTimeout { extension: String, waited_ms: u64 },
    #[error("straggler timeout with 0 {extension} artifacts")]
    StragglersVanished { extension: String },
    #[error("artifact wait interrupted by shutdown")]
    Interrupted,
    #[error("failed to list artifacts in {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub straggler_timeout: Duration,
    pub global_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTarget {
    pub dir: PathBuf,
    pub count: usize,
    pub extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitDecision {
    /// The target count is present.
    Ready,
    /// The straggler window closed with a partial set.
    AcceptPartial,
    Pending,
    GlobalTimeout,
    StragglersVanished,
}

/// Decision state for one wait. Time is passed in so the policy can be driven
/// deterministically.
#[derive(Debug, Clone)]
pub struct StragglerTracker {
    policy: WaitPolicy,
    target: usize,
    global_start: Instant,
    first_arrival: Option<Instant>,
}

impl StragglerTracker {
    pub fn new(policy: WaitPolicy, target: usize, global_start: Instant) -> Self {
        Self {
            policy,
            target,
            global_start,
            first_arrival: None,
        }
    }

    pub fn first_arrival(&self) -> Option<Instant> {
        self.first_arrival
    }

    /// Both deadlines are inclusive: the straggler window closes at exactly
    /// `first_arrival + straggler_timeout`, the global one at `global_start + global_timeout`.
    pub fn observe(&mut self, count: usize, now: Instant) -> WaitDecision {
        if count >= self.target {
            return WaitDecision::Ready;
        }
        let first_arrival = self.first_arrival;
        match first_arrival {
            None if count > 0 => {
                self.first_arrival = Some(now);
                WaitDecision::Pending
            }
            Some(first)
                if now.saturating_duration_since(first) >= self.policy.straggler_timeout =>
            {
                if count > 0 {
                    WaitDecision::AcceptPartial
                } else {
                    WaitDecision::StragglersVanished
                }
            }
            _ if now.saturating_duration_since(self.global_start) >= self.policy.global_timeout => {
                WaitDecision::GlobalTimeout
            }
            _ => WaitDecision::Pending,
        }
    }
}

/// Matching artifacts in `dir`, sorted by file name.
pub fn list_artifacts(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, WaitError> {
    let io_err = |source| WaitError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_hidden_name(name) || !name.ends_with(extension) || !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Polls `target.dir` until the policy resolves. Returns the accepted files.
pub fn wait_for_artifacts(
    target: &ArtifactTarget,
    policy: WaitPolicy,
    stop: &AtomicBool,
    paths: &FleetPaths,
) -> Result<Vec<PathBuf>, WaitError> {
    let started = Instant::now();
    let mut tracker = StragglerTracker::new(policy, target.count, started);
    loop {
        let files = list_artifacts(&target.dir, &target.extension)?;
        let had_first = tracker.first_arrival().is_some();
        match tracker.observe(files.len(), Instant::now()) {
            WaitDecision::Ready => return Ok(files),
            WaitDecision::AcceptPartial => {
                log_warn(
                    paths,
                    "artifacts.straggler",
                    &format!(
                        "straggler timeout, accepting {}/{} {}",
                        files.len(),
                        target.count,
                        target.extension
                    ),
                );
                return Ok(files);
            }
            WaitDecision::StragglersVanished => {
                return Err(WaitError::StragglersVanished {
                    extension: target.extension.clone(),
                })
            }
            WaitDecision::GlobalTimeout => {
                return Err(WaitError::GlobalTimeout {
                    extension: target.extension.clone(),
                    waited_ms: started.elapsed().as_millis() as u64,
                })
            }
            WaitDecision::Pending => {
                if !had_first && tracker.first_arrival().is_some() {
                    log_info(
                        paths,
                        "artifacts.first_arrival",
                        &format!("first {} detected, straggler timer started", target.extension),
                    );
                }
            }
        }
        if stop.load(Ordering::Relaxed) {
            return Err(WaitError::Interrupted);
        }
        thread::sleep(policy.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(units: u64) -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_secs(units),
            straggler_timeout: Duration::from_secs(5 * units),
            global_timeout: Duration::from_secs(30 * units),
        }
    }

    #[test]
    fn full_set_returns_immediately() {
        let t0 = Instant::now();
        let mut tracker = StragglerTracker::new(policy(1), 2, t0);
        assert_eq!(tracker.observe(2, t0), WaitDecision::Ready);
        assert_eq!(tracker.observe(3, t0), WaitDecision::Ready);
    }

    #[test]
    fn single_straggling_take_is_accepted_when_window_closes() {
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);
        let mut tracker = StragglerTracker::new(policy(1), 2, t0);

        assert_eq!(tracker.observe(0, at(0)), WaitDecision::Pending);
        assert_eq!(tracker.observe(1, at(1)), WaitDecision::Pending);
        assert_eq!(tracker.first_arrival(), Some(at(1)));
        assert_eq!(tracker.observe(1, at(5)), WaitDecision::Pending);
        assert_eq!(tracker.observe(1, at(6)), WaitDecision::AcceptPartial);
    }

    #[test]
    fn deadlines_close_on_the_boundary_instant() {
        let t0 = Instant::now();
        let mut tracker = StragglerTracker::new(policy(1), 2, t0);
        let first = t0 + Duration::from_secs(1);
        assert_eq!(tracker.observe(1, first), WaitDecision::Pending);
        assert_eq!(
            tracker.observe(1, first + Duration::from_millis(4_999)),
            WaitDecision::Pending
        );
        assert_eq!(
            tracker.observe(1, first + Duration::from_secs(5)),
            WaitDecision::AcceptPartial
        );

        let mut empty = StragglerTracker::new(policy(1), 2, t0);
        assert_eq!(
            empty.observe(0, t0 + Duration::from_millis(29_999)),
            WaitDecision::Pending
        );
        assert_eq!(
            empty.observe(0, t0 + Duration::from_secs(30)),
            WaitDecision::GlobalTimeout
        );
    }

    #[test]
    fn zero_files_fail_exactly_at_global_timeout() {
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);
        let mut tracker = StragglerTracker::new(policy(1), 2, t0);

        for second in [0, 2, 10, 28, 29] {
            assert_eq!(tracker.observe(0, at(second)), WaitDecision::Pending);
        }
        assert_eq!(tracker.observe(0, at(30)), WaitDecision::GlobalTimeout);
    }

    #[test]
    fn files_vanishing_after_first_arrival_fail_at_straggler_deadline() {
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);
        let mut tracker = StragglerTracker::new(policy(1), 2, t0);

        assert_eq!(tracker.observe(1, at(1)), WaitDecision::Pending);
        assert_eq!(tracker.observe(0, at(6)), WaitDecision::StragglersVanished);
    }

    #[test]
    fn late_full_set_within_window_wins_over_partial() {
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);
        let mut tracker = StragglerTracker::new(policy(1), 2, t0);

        assert_eq!(tracker.observe(1, at(1)), WaitDecision::Pending);
        assert_eq!(tracker.observe(2, at(4)), WaitDecision::Ready);
    }
}
