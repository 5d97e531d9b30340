pub mod ingest_worker;
pub mod logging;
pub mod queue_worker;
pub mod recovery;
pub mod state_paths;
pub mod status;
pub mod supervisor;
pub mod worker_primitives;
pub mod worker_registry;

pub use crate::shared::errors::RuntimeError;
pub use logging::{append_runtime_log, log_error, log_info, log_warn, LogLevel};
pub use queue_worker::{run_queue_worker, DriverJobRunner, QueueWorkerContext};
pub use recovery::recover_processing_jobs;
pub use state_paths::{bootstrap_fleet_paths, FleetPaths};
pub use status::{load_status, save_status, DaemonStatus, NodeActivity};
pub use supervisor::{run_daemon, signal_stop};
pub use worker_registry::{WorkerEvent, WorkerHealth, WorkerState};
