pub mod app;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod jobs;
pub mod queue;
pub mod runtime;
pub mod shared;
