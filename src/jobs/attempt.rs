use super::waiter::WaitError;
use crate::engine::ActionError;

#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("abort flags raised: {}", flags.join(", "))]
    Flagged { flags: Vec<String> },
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Artifacts(#[from] WaitError),
    #[error("scratch io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AttemptError {
    /// Shutdown interrupts end the cycle without consuming further attempts.
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            Self::Action(ActionError::Interrupted { .. }) | Self::Artifacts(WaitError::Interrupted)
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempt(s): {last}")]
pub struct CycleFailure {
    pub attempts: u32,
    #[source]
    pub last: AttemptError,
}

/// Bounded retry loop shared by both pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCycle {
    pub max_attempts: u32,
}

impl AttemptCycle {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs `attempt` (1-indexed) until it succeeds or the budget is spent. `pre_attempt`
    /// runs before every attempt, `on_failure` after every failed one.
    pub fn run<T>(
        &self,
        mut pre_attempt: impl FnMut(u32),
        mut attempt: impl FnMut(u32) -> Result<T, AttemptError>,
        mut on_failure: impl FnMut(u32, &AttemptError),
    ) -> Result<T, CycleFailure> {
        let mut number = 1;
        loop {
            pre_attempt(number);
            match attempt(number) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_failure(number, &err);
                    if err.is_interrupt() || number >= self.max_attempts {
                        return Err(CycleFailure {
                            attempts: number,
                            last: err,
                        });
                    }
                }
            }
            number += 1;
        }
    }
}
