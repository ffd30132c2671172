//! Metrics sink
//!
//! The worker only ever appends counter increments; the backend that
//! exports them lives outside this workspace. `InMemoryMetricRegistry`
//! keeps counters in process for the CLI summary and for tests.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Counter incremented every time a task attempt exceeds its deadline
pub const METRIC_WORKER_TIMEOUT_COUNT: &str = "worker.timeout.count";

pub const TAG_TASK_ID: &str = "task_id";
pub const TAG_TASK_TYPE: &str = "task_type";
pub const TAG_ATTEMPT_COUNT: &str = "attempt_count";

/// Metric tags, ordered so that the same set always yields the same key
pub type Tags = BTreeMap<String, String>;

/// Thread-safe metrics sink
pub trait MetricRegistry: Send + Sync {
    /// Increment a counter by `value`
    fn increment(&self, name: &str, tags: &Tags, value: u64);

    /// Increment a counter by one
    fn counter(&self, name: &str, tags: &Tags) {
        self.increment(name, tags, 1);
    }
}

/// Build a tag set from key/value pairs
pub fn tags<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Tags
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// ============================================================================
// No-op
// ============================================================================

/// Registry that drops everything (metrics disabled)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricRegistry;

impl MetricRegistry for NoopMetricRegistry {
    fn increment(&self, _name: &str, _tags: &Tags, _value: u64) {}
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    name: String,
    tags: Tags,
}

/// One counter value in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSample {
    pub name: String,
    pub tags: Tags,
    pub value: u64,
}

/// Process-local counter registry
#[derive(Debug, Default)]
pub struct InMemoryMetricRegistry {
    prefix: Option<String>,
    counters: RwLock<HashMap<CounterKey, Arc<AtomicU64>>>,
}

impl InMemoryMetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every metric name with `prefix.`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            counters: RwLock::new(HashMap::new()),
        }
    }

    fn full_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        }
    }

    /// Current value of one counter (0 if never incremented)
    pub fn count(&self, name: &str, tags: &Tags) -> u64 {
        let key = CounterKey {
            name: self.full_name(name),
            tags: tags.clone(),
        };
        self.counters
            .read()
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of a counter over every tag set
    pub fn total(&self, name: &str) -> u64 {
        let name = self.full_name(name);
        self.counters
            .read()
            .iter()
            .filter(|(key, _)| key.name == name)
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .sum()
    }

    /// All counters, sorted by name
    pub fn snapshot(&self) -> Vec<CounterSample> {
        let mut samples: Vec<CounterSample> = self
            .counters
            .read()
            .iter()
            .map(|(key, c)| CounterSample {
                name: key.name.clone(),
                tags: key.tags.clone(),
                value: c.load(Ordering::Relaxed),
            })
            .collect();
        samples.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));
        samples
    }
}

impl MetricRegistry for InMemoryMetricRegistry {
    fn increment(&self, name: &str, tags: &Tags, value: u64) {
        let key = CounterKey {
            name: self.full_name(name),
            tags: tags.clone(),
        };

        let existing = self.counters.read().get(&key).cloned();
        let counter = match existing {
            Some(counter) => counter,
            None => Arc::clone(self.counters.write().entry(key).or_default()),
        };

        let total = counter.fetch_add(value, Ordering::Relaxed) + value;
        trace!(metric = name, total, "counter incremented");
    }
}
