//! Location Binder - lets a store record its output location into a
//! configuration without leaking into anything it did not set.
//!
//! The store writes into an isolated [`ConfigScope`](contracts::ConfigScope);
//! only the resulting delta is merged back. Attempt-private staging follows
//! from the bound location plus the attempt id (see [`contracts::staging`]).

use contracts::{ConfigDelta, Configuration, ContractError, JobContext, StoreFunc, TaskAttemptContext};
use tracing::{debug, instrument};

use crate::error::OutputError;
use crate::registry::ResolvedStore;

/// Compute the configuration delta produced by binding `location`,
/// without applying it
pub fn bound_delta(
    conf: &Configuration,
    func: &mut dyn StoreFunc,
    location: &str,
) -> Result<ConfigDelta, ContractError> {
    let mut scope = conf.scope();
    func.set_store_location(location, &mut scope)?;
    Ok(scope.into_delta())
}

/// Bind `location` into `conf`: keys the store set overwrite, all other keys
/// stay untouched
#[instrument(name = "location_bind", skip(conf, func))]
pub fn bind(
    conf: &mut Configuration,
    func: &mut dyn StoreFunc,
    location: &str,
) -> Result<(), ContractError> {
    let delta = bound_delta(conf, func, location)?;
    debug!(keys = delta.len(), "Merging store configuration");
    conf.merge(delta);
    Ok(())
}

/// Isolated copy of `ctx` with `store`'s location bound
pub fn bind_attempt(
    ctx: &TaskAttemptContext,
    store: &mut ResolvedStore,
) -> Result<TaskAttemptContext, OutputError> {
    let mut copy = ctx.isolated_copy();
    let location = store.descriptor.location.clone();
    bind(copy.conf_mut(), store.func.as_mut(), &location)
        .map_err(|e| OutputError::store(store.name(), e))?;
    Ok(copy)
}

/// Isolated copy of `job` with `store`'s location bound
pub fn bind_job(job: &JobContext, store: &mut ResolvedStore) -> Result<JobContext, ContractError> {
    let mut copy = job.isolated_copy();
    let location = store.descriptor.location.clone();
    bind(copy.conf_mut(), store.func.as_mut(), &location)?;
    Ok(copy)
}
