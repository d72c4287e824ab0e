//! # Stores
//!
//! Built-in store plugins:
//! - `text`: delimited text lines
//! - `json`: one JSON document per line
//! - `log`: logs records through tracing, writes no files
//!
//! `text` and `json` share [`FileOutput`] and its [`FileCommitter`].

pub mod file;
pub mod json;
pub mod log;
pub mod text;

use std::sync::Arc;

use contracts::StoreFuncFactory;
use dispatcher::{OutputError, StoreCatalog};

pub use file::{FileCommitter, FileOutput};
pub use json::{JsonStore, JsonStoreFactory, JSON_KIND};
pub use log::{LogStore, LogStoreFactory, LOG_KIND};
pub use text::{TextStore, TextStoreFactory, TEXT_KIND};

/// Factories of every built-in store kind
pub fn builtin_factories() -> Vec<Arc<dyn StoreFuncFactory>> {
    vec![
        Arc::new(TextStoreFactory),
        Arc::new(JsonStoreFactory),
        Arc::new(LogStoreFactory),
    ]
}

/// Catalog with every built-in store kind registered
pub fn builtin_catalog() -> Result<StoreCatalog, OutputError> {
    let mut catalog = StoreCatalog::new();
    for factory in builtin_factories() {
        catalog.register(factory)?;
    }
    Ok(catalog)
}
