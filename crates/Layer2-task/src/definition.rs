//! Declared configuration of a task

use crate::deadline::Deadline;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use warden_foundation::{load_path, Error, Result};

/// Task definition as written in a flow / definition file
///
/// ```json
/// { "id": "nightly", "type": "shell", "timeoutMs": 60000,
///   "properties": { "command": "./backup.sh" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub id: String,

    #[serde(rename = "type")]
    pub task_type: String,

    /// Wall-clock budget; absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl TaskDefinition {
    pub fn new(id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            timeout_ms: None,
            properties: Map::new(),
        }
    }

    /// Load a definition file
    pub fn load(path: &Path) -> Result<Self> {
        load_path(path)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Declared deadline; `timeoutMs: 0` is a configuration error
    pub fn timeout(&self) -> Result<Option<Deadline>> {
        self.timeout_ms
            .map(|ms| {
                Deadline::from_millis(ms).map_err(|_| {
                    Error::Config(format!("task '{}': timeoutMs must be > 0", self.id))
                })
            })
            .transpose()
    }

    /// Optional typed property
    pub fn property<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.properties
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    Error::Config(format!(
                        "task '{}': property '{}' is invalid: {}",
                        self.id, key, e
                    ))
                })
            })
            .transpose()
    }

    /// Mandatory typed property
    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.property(key)?.ok_or_else(|| {
            Error::Config(format!(
                "task '{}': missing required property '{}'",
                self.id, key
            ))
        })
    }
}
