pub mod pause;
pub mod scheduler;

pub use pause::{set_paused, PauseSentinel, PauseSignal};
pub use scheduler::{ActiveJobs, DrainStep, JobQueue, JobRunner};
