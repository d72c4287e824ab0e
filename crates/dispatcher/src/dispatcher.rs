//! Output Dispatcher - the framework-facing output format.
//!
//! Decides per attempt whether one store or many must be satisfied and hands
//! back the matching writer, spec check and commit authority.

use std::fmt;
use std::sync::Arc;

use contracts::{Configuration, JobContext, TaskAttemptContext};
use tracing::{debug, info, instrument};

use crate::binder;
use crate::committer::CommitCoordinator;
use crate::error::OutputError;
use crate::proxy::RoutingWriter;
use crate::registry::{self, ResolvedStore, StoreCatalog};
use crate::session::StoreSession;
use crate::validator;

/// Output mode of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Single,
    Multi,
}

impl Mode {
    /// Mode implied by a total store count. Zero stores is not a mode.
    pub fn for_count(count: usize) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(Self::Single),
            _ => Some(Self::Multi),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stores of one attempt, tagged with their mode.
///
/// Built once from a single registry snapshot and never re-derived.
#[derive(Debug)]
pub enum StorePlan {
    Single(ResolvedStore),
    Multi(Vec<ResolvedStore>),
}

impl StorePlan {
    /// # Errors
    /// [`OutputError::InvariantViolation`] for an empty store list; callers
    /// must configure at least one store
    pub fn from_stores(mut stores: Vec<ResolvedStore>) -> Result<Self, OutputError> {
        match stores.len() {
            0 => Err(OutputError::invariant(
                "no stores configured for this attempt; at least one store is required",
            )),
            1 => Ok(Self::Single(stores.remove(0))),
            _ => Ok(Self::Multi(stores)),
        }
    }

    /// Resolve both roles from `conf` (map stores first)
    pub fn resolve(conf: &Configuration, catalog: &StoreCatalog) -> Result<Self, OutputError> {
        Self::from_stores(registry::resolve_all(conf, catalog)?)
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Single(_) => Mode::Single,
            Self::Multi(_) => Mode::Multi,
        }
    }

    /// Always at least one; [`StorePlan::from_stores`] rejects an empty list
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(stores) => stores.len(),
        }
    }

    pub fn stores(&self) -> Vec<&ResolvedStore> {
        match self {
            Self::Single(store) => vec![store],
            Self::Multi(stores) => stores.iter().collect(),
        }
    }

    pub fn into_stores(self) -> Vec<ResolvedStore> {
        match self {
            Self::Single(store) => vec![store],
            Self::Multi(stores) => stores,
        }
    }
}

/// Multi-store output format.
///
/// Entry points the runtime calls: [`record_writer`](Self::record_writer) per
/// attempt, [`check_output_specs`](Self::check_output_specs) once per job and
/// [`output_committer`](Self::output_committer) per attempt.
#[derive(Debug, Clone)]
pub struct StoreOutputFormat {
    catalog: Arc<StoreCatalog>,
}

impl StoreOutputFormat {
    pub fn new(catalog: Arc<StoreCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &StoreCatalog {
        &self.catalog
    }

    /// Store plan for a configuration
    pub fn plan(&self, conf: &Configuration) -> Result<StorePlan, OutputError> {
        StorePlan::resolve(conf, &self.catalog)
    }

    /// Acquire the attempt's writer.
    ///
    /// With a single store, its location is bound into `ctx` and its native
    /// writer wrapped in a Single proxy. With several, an inert Multi proxy is
    /// returned and records go through [`open_session`](Self::open_session).
    #[instrument(
        name = "output_acquire_writer",
        skip(self, ctx),
        fields(attempt = %ctx.attempt())
    )]
    pub fn record_writer(&self, ctx: &mut TaskAttemptContext) -> Result<RoutingWriter, OutputError> {
        match self.plan(ctx.conf())? {
            StorePlan::Single(mut store) => {
                let location = store.descriptor.location.clone();
                binder::bind(ctx.conf_mut(), store.func.as_mut(), &location)
                    .map_err(|e| OutputError::store(store.name(), e))?;
                let writer = store
                    .func
                    .output_mechanism()
                    .record_writer(ctx)
                    .map_err(|e| OutputError::store(store.name(), e))?;
                debug!(store = %store.name(), location = %location, "Single-store writer acquired");
                RoutingWriter::single(store, writer)
            }
            StorePlan::Multi(stores) => {
                debug!(stores = stores.len(), "Multi-store placeholder writer acquired");
                Ok(RoutingWriter::multi())
            }
        }
    }

    /// Validate every store's output spec before the job is submitted
    pub fn check_output_specs(&self, job: &JobContext) -> Result<(), OutputError> {
        validator::validate(job, &self.catalog)
    }

    /// Commit authorities for the attempt, one per store
    pub fn output_committer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<CommitCoordinator, OutputError> {
        CommitCoordinator::for_attempt(ctx, &self.catalog)
    }

    /// Open the store-execution session writing to every store of the attempt
    #[instrument(name = "output_open_session", skip(self, ctx), fields(attempt = %ctx.attempt()))]
    pub fn open_session(&self, ctx: &TaskAttemptContext) -> Result<StoreSession, OutputError> {
        let session = StoreSession::open(ctx, &self.catalog)?;
        info!(stores = session.len(), "Store session opened");
        Ok(session)
    }
}
