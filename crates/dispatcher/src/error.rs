//! Output layer error types

use std::fmt;

use contracts::{ContractError, StoreRole};
use thiserror::Error;

/// Output-layer errors
#[derive(Debug, Error)]
pub enum OutputError {
    /// Store list absent or malformed in configuration. Fatal for the attempt.
    #[error("failed to decode store list at '{key}': {message}")]
    Decode { key: String, message: String },

    /// The surrounding framework broke a contract of the output layer
    #[error("internal error: {0}")]
    InvariantViolation(String),

    /// A store's output spec check failed; aborts job submission
    #[error("output spec check failed for {role} store '{store}': {source}")]
    Validation {
        store: String,
        role: StoreRole,
        #[source]
        source: ContractError,
    },

    /// Error raised by a store plugin, propagated with the store's name
    #[error("store '{store}' failed: {source}")]
    Store {
        store: String,
        #[source]
        source: ContractError,
    },

    /// A fan-out operation failed for one or more stores
    #[error("{operation} failed for {} store(s): {}", .failures.len(), summarize(.failures))]
    PerStore {
        operation: &'static str,
        failures: Vec<StoreFailure>,
    },

    /// Session write addressed a store that is not part of the attempt
    #[error("unknown store '{0}'")]
    UnknownStore(String),

    /// Catalog already holds a factory for this kind
    #[error("duplicate store kind '{0}'")]
    DuplicateKind(String),

    /// Contract error
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl OutputError {
    /// Create a store error
    pub fn store(store: impl Into<String>, source: ContractError) -> Self {
        Self::Store {
            store: store.into(),
            source,
        }
    }

    /// Create an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Stores named by a `PerStore` error, empty otherwise
    pub fn failed_stores(&self) -> Vec<&str> {
        match self {
            Self::PerStore { failures, .. } => failures.iter().map(|f| f.store.as_str()).collect(),
            Self::Validation { store, .. } | Self::Store { store, .. } => vec![store.as_str()],
            _ => Vec::new(),
        }
    }
}

/// One store's failure inside a fan-out operation
#[derive(Debug)]
pub struct StoreFailure {
    pub store: String,
    pub error: OutputError,
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.store, self.error)
    }
}

fn summarize(failures: &[StoreFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
