pub mod attempt;
pub mod driver;
pub mod executor;
pub mod identity;
pub mod layout;
pub mod profile;
pub mod waiter;

pub use attempt::{AttemptCycle, AttemptError, CycleFailure};
pub use driver::{JobDriver, JobError, JobOutcome};
pub use executor::ItemExecutor;
pub use identity::{parse_job_name, JobIdentity, JobKey, JobKind, NAME_DELIMITER};
pub use layout::{discover_items, ItemSource, JobDir, WorkItem};
pub use profile::{AbortFlags, ExecutionPolicy, PipelineProfile};
pub use waiter::{wait_for_artifacts, ArtifactTarget, StragglerTracker, WaitDecision, WaitError, WaitPolicy};
