pub mod runner;
pub mod types;

pub use runner::{is_benign_stderr, reap_stale_processes, ProcessActionRunner};
pub use types::{ActionError, ActionReport, ActionRequest, ActionRunner};
