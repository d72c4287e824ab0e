//! Configuration - ordered key/value settings carried by job and attempt contexts
//!
//! Writes made on behalf of a store never go straight into a shared
//! `Configuration`. They are recorded in a [`ConfigScope`] opened over a
//! snapshot, turned into a [`ConfigDelta`] and merged explicitly by the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized first-stage store list
pub const MAP_STORES_KEY: &str = "multistore.map.stores";

/// Serialized second-stage store list
pub const REDUCE_STORES_KEY: &str = "multistore.reduce.stores";

/// Output directory recorded by file-backed stores during location binding
pub const OUTPUT_DIR_KEY: &str = "multistore.output.dir";

/// Partition number of the running task
pub const TASK_PARTITION_KEY: &str = "multistore.task.partition";

/// Attempt id of the running task attempt
pub const TASK_ATTEMPT_KEY: &str = "multistore.task.attempt";

/// Key/value configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    entries: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn unset(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Open an isolated scope over this configuration.
    ///
    /// Reads see this configuration overlaid with the scope's own writes;
    /// writes stay in the scope until its delta is merged back.
    pub fn scope(&self) -> ConfigScope<'_> {
        ConfigScope {
            base: self,
            delta: ConfigDelta::default(),
        }
    }

    /// Apply a delta: touched keys are overwritten (or removed), every other
    /// key is left as is.
    pub fn merge(&mut self, delta: ConfigDelta) {
        for (key, change) in delta.changes {
            match change {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Keys written through a [`ConfigScope`]. `None` records a removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDelta {
    changes: BTreeMap<String, Option<String>>,
}

impl ConfigDelta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn touched_keys(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// `Some(Some(v))` if the key was set, `Some(None)` if removed, `None` if untouched
    pub fn change(&self, key: &str) -> Option<Option<&str>> {
        self.changes.get(key).map(|v| v.as_deref())
    }
}

/// Isolated, copy-on-write view over a [`Configuration`]
#[derive(Debug)]
pub struct ConfigScope<'a> {
    base: &'a Configuration,
    delta: ConfigDelta,
}

impl ConfigScope<'_> {
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.delta.changes.get(key) {
            Some(change) => change.as_deref(),
            None => self.base.get(key),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.delta.changes.insert(key.into(), Some(value.into()));
    }

    pub fn unset(&mut self, key: &str) {
        self.delta.changes.insert(key.to_string(), None);
    }

    pub fn delta(&self) -> &ConfigDelta {
        &self.delta
    }

    pub fn into_delta(self) -> ConfigDelta {
        self.delta
    }
}
