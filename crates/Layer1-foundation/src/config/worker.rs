//! Worker Config - settings of the worker process
//!
//! Loaded from the global store and overlaid by the project store.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings file name
pub const WORKER_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Worker Config
// ============================================================================

/// Worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Version (for migrations)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Log filter used when `RUST_LOG` is not set (e.g. "info", "warden_task=debug")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Shell task settings
    #[serde(default)]
    pub shell: ShellSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: None,
            metrics: MetricsConfig::default(),
            shell: ShellSettings::default(),
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Global + project merged load
    pub fn load() -> Result<Self> {
        let global = JsonStore::global().ok();
        let project = JsonStore::current_project().ok();
        Self::load_from(global.as_ref(), project.as_ref())
    }

    /// Merged load from explicit stores, project overriding global
    pub fn load_from(global: Option<&JsonStore>, project: Option<&JsonStore>) -> Result<Self> {
        let mut config = Self::new();

        for store in [global, project].into_iter().flatten() {
            if let Some(layer) = store.read_layer(WORKER_CONFIG_FILE)? {
                config.merge(layer)?;
            }
        }

        Ok(config)
    }

    /// Overlay a partial settings document; only keys present in `layer` override
    pub fn merge(&mut self, layer: Value) -> Result<()> {
        let mut merged = serde_json::to_value(&*self)?;
        overlay(&mut merged, layer);
        *self = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("Invalid {}: {}", WORKER_CONFIG_FILE, e)))?;
        Ok(())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Effective log filter
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

// ============================================================================
// Metrics Config
// ============================================================================

/// Metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfig {
    /// Record metrics at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix prepended to every metric name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: None,
        }
    }
}

// ============================================================================
// Shell Settings
// ============================================================================

/// Settings of the built-in shell task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellSettings {
    /// Time between SIGTERM and SIGKILL when a shell task is stopped
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Interpreter override (defaults to `sh` / `cmd`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            interpreter: None,
        }
    }
}

impl ShellSettings {
    pub fn grace_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.grace_period_ms)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Recursive object merge; anything else in `layer` replaces `base`
fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_grace_period_ms() -> u64 {
    5_000
}
