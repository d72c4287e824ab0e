//! Layered error definitions
//!
//! Categorized by source: config / store spec / store write / commit

use thiserror::Error;

/// Unified error type reported by store plugins and contract helpers
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Job plan parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Job plan validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// A configuration value could not be decoded
    #[error("config decode error at '{key}': {message}")]
    ConfigDecode { key: String, message: String },

    /// A mandatory configuration key is absent
    #[error("missing config key '{key}'")]
    MissingConfig { key: String },

    // ===== Store Errors =====
    /// Output specification rejected by a store's output mechanism
    #[error("invalid output spec for '{location}': {message}")]
    OutputSpec { location: String, message: String },

    /// Store function parameter rejected at instantiation
    #[error("invalid parameter '{param}' for store kind '{kind}': {message}")]
    InvalidParam {
        kind: String,
        param: String,
        message: String,
    },

    /// No factory registered for a store kind
    #[error("unknown store kind '{kind}'")]
    UnknownStoreKind { kind: String },

    /// Store write error
    #[error("store '{store}' write error: {message}")]
    StoreWrite { store: String, message: String },

    // ===== Commit Errors =====
    /// Commit protocol error raised by an output committer
    #[error("store '{store}' commit error: {message}")]
    Commit { store: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create configuration decode error
    pub fn config_decode(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigDecode {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create missing configuration error
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// Create output spec error
    pub fn output_spec(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OutputSpec {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create invalid parameter error
    pub fn invalid_param(
        kind: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            kind: kind.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create store write error
    pub fn store_write(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create commit error
    pub fn commit(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Commit {
            store: store.into(),
            message: message.into(),
        }
    }
}
