//! Spec Validator - checks every store's output spec before job submission

use std::collections::HashMap;

use contracts::staging::normalize_location;
use contracts::{ContractError, JobContext};
use tracing::{info, instrument, warn};

use crate::binder;
use crate::error::OutputError;
use crate::registry::{self, StoreCatalog};

/// Validate every store across both roles, map stores first.
///
/// Each store is bound into its own copy of `job`, so one store's binding
/// never shows up in another store's check. `job` itself is not modified.
/// Two stores at the same (normalized) location would stage into the same
/// files, so the second one is rejected.
///
/// # Errors
/// The first failing store as [`OutputError::Validation`]
#[instrument(name = "spec_validate", skip_all, fields(job = %job.job_id()))]
pub fn validate(job: &JobContext, catalog: &StoreCatalog) -> Result<(), OutputError> {
    let stores = registry::resolve_all(job.conf(), catalog)?;
    if stores.is_empty() {
        return Err(OutputError::invariant(
            "no stores configured for this job; at least one store is required",
        ));
    }

    let count = stores.len();
    let mut locations: HashMap<_, String> = HashMap::new();
    for mut store in stores {
        let role = store.role();
        let name = store.name().to_string();
        let checked = match locations.get(&normalize_location(store.location())) {
            Some(first) => Err(ContractError::output_spec(
                store.location(),
                format!("location already used by store '{}'", first),
            )),
            None => binder::bind_job(job, &mut store).and_then(|bound| {
                store.func.output_mechanism().check_output_specs(&bound)
            }),
        };
        if let Err(source) = checked {
            warn!(store = %name, role = %role, error = %source, "Output spec check failed");
            return Err(OutputError::Validation {
                store: name,
                role,
                source,
            });
        }
        locations.insert(normalize_location(store.location()), name);
    }

    info!(stores = count, "Output specs validated");
    Ok(())
}
