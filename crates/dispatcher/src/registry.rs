//! Store Registry - decodes the per-role store lists of a task's configuration
//! and instantiates their store functions through a [`StoreCatalog`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use contracts::{
    decode_store_list, encode_store_list, Configuration, ContractError, FuncSpec, StoreDescriptor,
    StoreFunc, StoreFuncFactory, StoreRole,
};
use tracing::{debug, instrument};

use crate::error::OutputError;

/// Store kind -> factory.
///
/// Built during initialization, shared read-only by every attempt afterwards.
#[derive(Default)]
pub struct StoreCatalog {
    factories: HashMap<String, Arc<dyn StoreFuncFactory>>,
}

impl StoreCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its kind
    pub fn register(&mut self, factory: Arc<dyn StoreFuncFactory>) -> Result<(), OutputError> {
        let kind = factory.kind().to_string();
        if self.factories.contains_key(&kind) {
            return Err(OutputError::DuplicateKind(kind));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, factory: Arc<dyn StoreFuncFactory>) -> Result<Self, OutputError> {
        self.register(factory)?;
        Ok(self)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate the store function a spec refers to
    pub fn instantiate(&self, spec: &FuncSpec) -> Result<Box<dyn StoreFunc>, ContractError> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or_else(|| ContractError::UnknownStoreKind {
                kind: spec.kind.clone(),
            })?;
        factory.create(spec)
    }
}

impl fmt::Debug for StoreCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// A decoded descriptor with its live store function
pub struct ResolvedStore {
    pub descriptor: StoreDescriptor,
    pub func: Box<dyn StoreFunc>,
}

impl ResolvedStore {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn location(&self) -> &str {
        &self.descriptor.location
    }

    pub fn role(&self) -> StoreRole {
        self.descriptor.role
    }
}

impl fmt::Debug for ResolvedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStore")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Write `stores` as the store list of `role`
pub fn encode(
    conf: &mut Configuration,
    role: StoreRole,
    stores: &[StoreDescriptor],
) -> Result<(), OutputError> {
    conf.set(role.config_key(), encode_store_list(stores)?);
    Ok(())
}

/// Read the store list of `role`.
///
/// # Errors
/// [`OutputError::Decode`] when the key is absent or its value malformed
pub fn decode(conf: &Configuration, role: StoreRole) -> Result<Vec<StoreDescriptor>, OutputError> {
    let key = role.config_key();
    let raw = conf.get(key).ok_or_else(|| OutputError::Decode {
        key: key.to_string(),
        message: "store list is absent".to_string(),
    })?;
    decode_store_list(key, raw).map_err(|e| OutputError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Decode the store list of `role` and instantiate every store function.
///
/// An unknown store kind is a decode failure: the list cannot be used.
#[instrument(name = "store_registry_resolve", skip(conf, catalog), fields(role = %role))]
pub fn resolve(
    conf: &Configuration,
    role: StoreRole,
    catalog: &StoreCatalog,
) -> Result<Vec<ResolvedStore>, OutputError> {
    let descriptors = decode(conf, role)?;
    let mut resolved = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let func = catalog
            .instantiate(&descriptor.func)
            .map_err(|e| OutputError::Decode {
                key: role.config_key().to_string(),
                message: format!("store '{}': {e}", descriptor.name),
            })?;
        resolved.push(ResolvedStore { descriptor, func });
    }
    debug!(stores = resolved.len(), "Store list resolved");
    Ok(resolved)
}

/// Resolve both roles, first-stage stores first
pub fn resolve_all(
    conf: &Configuration,
    catalog: &StoreCatalog,
) -> Result<Vec<ResolvedStore>, OutputError> {
    let mut all = Vec::new();
    for role in StoreRole::ALL {
        all.extend(resolve(conf, role, catalog)?);
    }
    Ok(all)
}
