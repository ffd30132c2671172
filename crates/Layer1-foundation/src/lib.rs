//! # warden-foundation
//!
//! Foundation layer for Warden:
//! - Error: shared error enum and `Result` alias
//! - Config: worker settings (global + project JSON)
//! - Storage: JSON file store
//! - Metrics: counter sink consumed by the execution unit

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{MetricsConfig, ShellSettings, WorkerConfig, WORKER_CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{load_path, JsonStore};

// ============================================================================
// Metrics
// ============================================================================
pub use metrics::{
    tags, CounterSample, InMemoryMetricRegistry, MetricRegistry, NoopMetricRegistry, Tags,
    METRIC_WORKER_TIMEOUT_COUNT, TAG_ATTEMPT_COUNT, TAG_TASK_ID, TAG_TASK_TYPE,
};
