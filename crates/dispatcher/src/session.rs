//! Store Session - per-record output for multi-store attempts.
//!
//! Each store gets its own location-bound copy of the attempt context and its
//! own native writer, so stores never see each other's settings.

use std::sync::Arc;

use contracts::{RecordWriter, TaskAttemptContext, TaskAttemptId, Tuple};
use tracing::{debug, instrument, warn};

use crate::binder;
use crate::error::{OutputError, StoreFailure};
use crate::metrics::{MetricsSnapshot, StoreMetrics};
use crate::registry::{self, ResolvedStore, StoreCatalog};

struct SessionStore {
    store: ResolvedStore,
    ctx: TaskAttemptContext,
    writer: Box<dyn RecordWriter>,
    metrics: Arc<StoreMetrics>,
}

impl SessionStore {
    fn put(&mut self, tuple: &Tuple) -> Result<(), OutputError> {
        match self.store.func.put_next(tuple, self.writer.as_mut()) {
            Ok(()) => {
                self.metrics.inc_write_count();
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                Err(OutputError::store(self.store.name(), e))
            }
        }
    }
}

/// Open writers for every store of one attempt
pub struct StoreSession {
    attempt: TaskAttemptId,
    stores: Vec<SessionStore>,
}

impl StoreSession {
    /// Resolve the attempt's stores, bind each into its own context copy and
    /// open its writer
    #[instrument(name = "store_session_open", skip_all, fields(attempt = %ctx.attempt()))]
    pub fn open(ctx: &TaskAttemptContext, catalog: &StoreCatalog) -> Result<Self, OutputError> {
        let resolved = registry::resolve_all(ctx.conf(), catalog)?;
        if resolved.is_empty() {
            return Err(OutputError::invariant(
                "no stores configured for this attempt; at least one store is required",
            ));
        }

        let mut stores = Vec::with_capacity(resolved.len());
        for mut store in resolved {
            let bound = binder::bind_attempt(ctx, &mut store)?;
            let mut writer = store
                .func
                .output_mechanism()
                .record_writer(&bound)
                .map_err(|e| OutputError::store(store.name(), e))?;
            store
                .func
                .prepare_to_write(writer.as_mut())
                .map_err(|e| OutputError::store(store.name(), e))?;
            debug!(store = %store.name(), role = %store.role(), "Store writer opened");
            stores.push(SessionStore {
                store,
                ctx: bound,
                writer,
                metrics: Arc::new(StoreMetrics::new()),
            });
        }

        Ok(Self {
            attempt: ctx.attempt().clone(),
            stores,
        })
    }

    pub fn attempt(&self) -> &TaskAttemptId {
        &self.attempt
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Store names in session order
    pub fn store_names(&self) -> Vec<&str> {
        self.stores.iter().map(|s| s.store.name()).collect()
    }

    /// Write one record to the named store
    pub fn write(&mut self, store: &str, tuple: &Tuple) -> Result<(), OutputError> {
        let target = self
            .stores
            .iter_mut()
            .find(|s| s.store.name() == store)
            .ok_or_else(|| OutputError::UnknownStore(store.to_string()))?;
        target.put(tuple)
    }

    /// Write one record to every store. All stores are attempted.
    pub fn write_all(&mut self, tuple: &Tuple) -> Result<(), OutputError> {
        let failures: Vec<StoreFailure> = self
            .stores
            .iter_mut()
            .filter_map(|s| {
                s.put(tuple).err().map(|error| StoreFailure {
                    store: s.store.name().to_string(),
                    error,
                })
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(OutputError::PerStore {
                operation: "write",
                failures,
            })
        }
    }

    /// Current per-store counters
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.stores
            .iter()
            .map(|s| (s.store.name().to_string(), s.metrics.snapshot()))
            .collect()
    }

    /// Close every writer, returning final counters
    #[instrument(name = "store_session_close", skip(self), fields(attempt = %self.attempt))]
    pub fn close(self) -> Result<Vec<(String, MetricsSnapshot)>, OutputError> {
        let mut failures = Vec::new();
        let mut snapshots = Vec::with_capacity(self.stores.len());
        for mut s in self.stores {
            let name = s.store.name().to_string();
            if let Err(e) = s.writer.close(&s.ctx) {
                warn!(store = %name, error = %e, "Writer close failed");
                failures.push(StoreFailure {
                    store: name.clone(),
                    error: OutputError::store(&name, e),
                });
            }
            snapshots.push((name, s.metrics.snapshot()));
        }
        if failures.is_empty() {
            Ok(snapshots)
        } else {
            Err(OutputError::PerStore {
                operation: "close",
                failures,
            })
        }
    }
}

impl std::fmt::Debug for StoreSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSession")
            .field("attempt", &self.attempt.to_string())
            .field("stores", &self.store_names())
            .finish()
    }
}
