//! StoreDescriptor - one logical output destination
//!
//! Descriptors are written into the job configuration by the submitter and
//! decoded again inside every task attempt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{ContractError, MAP_STORES_KEY, REDUCE_STORES_KEY};

/// Stage whose output a store receives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRole {
    /// Emitted during the first stage
    #[default]
    Map,
    /// Emitted during the second stage
    Reduce,
}

impl StoreRole {
    /// Roles in resolution order
    pub const ALL: [StoreRole; 2] = [StoreRole::Map, StoreRole::Reduce];

    /// Configuration key holding this role's serialized store list
    pub fn config_key(self) -> &'static str {
        match self {
            StoreRole::Map => MAP_STORES_KEY,
            StoreRole::Reduce => REDUCE_STORES_KEY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoreRole::Map => "map",
            StoreRole::Reduce => "reduce",
        }
    }
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a store function: plugin kind plus its parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncSpec {
    /// Plugin kind (e.g. "text", "json", "log")
    pub kind: String,

    /// Kind-specific parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl FuncSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Store descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    /// Store name, unique within a job (used for logging/routing)
    pub name: String,

    /// Store function reference
    pub func: FuncSpec,

    /// Target location as written by the job author
    pub location: String,

    /// Output role
    #[serde(default)]
    pub role: StoreRole,
}

impl StoreDescriptor {
    pub fn new(
        name: impl Into<String>,
        func: FuncSpec,
        location: impl Into<String>,
        role: StoreRole,
    ) -> Self {
        Self {
            name: name.into(),
            func,
            location: location.into(),
            role,
        }
    }
}

/// Serialize a store list into its configuration value
pub fn encode_store_list(stores: &[StoreDescriptor]) -> Result<String, ContractError> {
    serde_json::to_string(stores)
        .map_err(|e| ContractError::Other(format!("store list encode error: {e}")))
}

/// Deserialize a store list read from configuration key `key`
pub fn decode_store_list(key: &str, raw: &str) -> Result<Vec<StoreDescriptor>, ContractError> {
    serde_json::from_str(raw).map_err(|e| ContractError::config_decode(key, e.to_string()))
}
