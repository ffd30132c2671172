//! Config - worker settings
//!
//! - `worker.rs` - WorkerConfig (log level, metrics, shell task)

mod worker;

pub use worker::{MetricsConfig, ShellSettings, WorkerConfig, WORKER_CONFIG_FILE};
