//! Record Routing Proxy - the single writer object handed to the runtime per
//! task attempt.

use std::sync::Arc;

use contracts::{Datum, RecordWriter, TaskAttemptContext, Tuple};
use tracing::{debug, instrument, warn};

use crate::dispatcher::Mode;
use crate::error::OutputError;
use crate::metrics::StoreMetrics;
use crate::registry::ResolvedStore;

enum Route {
    /// Sole store of the attempt with its open native writer
    Single {
        store: ResolvedStore,
        writer: Box<dyn RecordWriter>,
        metrics: Arc<StoreMetrics>,
    },
    /// Placeholder: per-record output belongs to the store session
    Multi,
}

/// Per-attempt writer.
///
/// A Single route always owns a writer and Multi never does; the pairing is
/// fixed at construction.
pub struct RoutingWriter {
    route: Route,
}

impl std::fmt::Debug for RoutingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingWriter")
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl RoutingWriter {
    /// Single-store proxy; calls the store's `prepare_to_write` hook once
    pub(crate) fn single(
        mut store: ResolvedStore,
        mut writer: Box<dyn RecordWriter>,
    ) -> Result<Self, OutputError> {
        store
            .func
            .prepare_to_write(writer.as_mut())
            .map_err(|e| OutputError::store(store.name(), e))?;
        Ok(Self {
            route: Route::Single {
                store,
                writer,
                metrics: Arc::new(StoreMetrics::new()),
            },
        })
    }

    pub(crate) fn multi() -> Self {
        Self { route: Route::Multi }
    }

    pub fn mode(&self) -> Mode {
        match self.route {
            Route::Single { .. } => Mode::Single,
            Route::Multi => Mode::Multi,
        }
    }

    /// Name of the bound store in Single mode
    pub fn store_name(&self) -> Option<&str> {
        match &self.route {
            Route::Single { store, .. } => Some(store.name()),
            Route::Multi => None,
        }
    }

    /// Write counters of the bound store in Single mode
    pub fn metrics(&self) -> Option<Arc<StoreMetrics>> {
        match &self.route {
            Route::Single { metrics, .. } => Some(Arc::clone(metrics)),
            Route::Multi => None,
        }
    }

    /// Forward `value` to the bound store. The key is ignored.
    ///
    /// # Errors
    /// [`OutputError::InvariantViolation`] in Multi mode, store errors unchanged
    /// otherwise
    pub fn write(&mut self, _key: Option<&Datum>, value: &Tuple) -> Result<(), OutputError> {
        match &mut self.route {
            Route::Single {
                store,
                writer,
                metrics,
            } => match store.func.put_next(value, writer.as_mut()) {
                Ok(()) => {
                    metrics.inc_write_count();
                    Ok(())
                }
                Err(e) => {
                    metrics.inc_failure_count();
                    Err(OutputError::store(store.name(), e))
                }
            },
            Route::Multi => Err(OutputError::invariant(
                "record written through a multi-store proxy; records must go through the store session",
            )),
        }
    }

    /// Close the native writer. No-op in Multi mode.
    #[instrument(name = "routing_writer_close", skip_all, fields(attempt = %ctx.attempt()))]
    pub fn close(self, ctx: &TaskAttemptContext) -> Result<(), OutputError> {
        match self.route {
            Route::Single {
                store,
                mut writer,
                metrics,
            } => {
                let snapshot = metrics.snapshot();
                debug!(
                    store = %store.name(),
                    written = snapshot.write_count,
                    failed = snapshot.failure_count,
                    "Closing store writer"
                );
                writer.close(ctx).map_err(|e| {
                    warn!(store = %store.name(), error = %e, "Writer close failed");
                    OutputError::store(store.name(), e)
                })
            }
            Route::Multi => Ok(()),
        }
    }
}
