//! Store capability traits - the only contract the output layer needs from a
//! storage plugin.
//!
//! A plugin provides a [`StoreFunc`] (formats tuples, records its location)
//! backed by an [`OutputMechanism`] (validates specs, opens writers, hands out
//! committers). The output layer is polymorphic over these traits and never
//! names a concrete store.

use std::sync::Arc;

use bytes::Bytes;

use crate::{ConfigScope, ContractError, FuncSpec, JobContext, TaskAttemptContext, Tuple};

/// Native record writer of an output mechanism
pub trait RecordWriter: Send {
    /// Write one record
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn write(&mut self, key: Option<Bytes>, value: Bytes) -> Result<(), ContractError>;

    /// Flush and release resources
    fn close(&mut self, ctx: &TaskAttemptContext) -> Result<(), ContractError>;
}

/// Commit protocol of one store.
///
/// Task-level calls receive the attempt context the committer was created for,
/// with the store's location already bound.
pub trait OutputCommitter: Send {
    fn setup_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        Ok(())
    }

    fn commit_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        Ok(())
    }

    fn abort_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        Ok(())
    }

    fn setup_task(&mut self, ctx: &TaskAttemptContext) -> Result<(), ContractError>;

    /// Whether this attempt staged anything that needs promotion
    fn needs_task_commit(&self, ctx: &TaskAttemptContext) -> Result<bool, ContractError>;

    /// Promote the attempt's staged output
    fn commit_task(&mut self, ctx: &TaskAttemptContext) -> Result<(), ContractError>;

    /// Discard the attempt's staged output. Must succeed when nothing was staged.
    fn abort_task(&mut self, ctx: &TaskAttemptContext) -> Result<(), ContractError>;
}

/// Output mechanism backing a store function
pub trait OutputMechanism: Send + Sync {
    /// Mechanism name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Validate the output specification found in `job`'s configuration
    fn check_output_specs(&self, job: &JobContext) -> Result<(), ContractError>;

    /// Open a writer that stages output privately for `ctx`'s attempt
    fn record_writer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>, ContractError>;

    /// Committer for `ctx`'s attempt
    fn output_committer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn OutputCommitter>, ContractError>;
}

/// Store function: the per-store capability set
pub trait StoreFunc: Send {
    /// Output mechanism this store writes through
    fn output_mechanism(&self) -> Arc<dyn OutputMechanism>;

    /// Record `location` (and any mechanism-specific settings) into `scope`
    fn set_store_location(
        &mut self,
        location: &str,
        scope: &mut ConfigScope<'_>,
    ) -> Result<(), ContractError>;

    /// Called once with the native writer before the first record
    fn prepare_to_write(&mut self, _writer: &mut dyn RecordWriter) -> Result<(), ContractError> {
        Ok(())
    }

    /// Accept the next record
    fn put_next(&mut self, tuple: &Tuple, writer: &mut dyn RecordWriter)
        -> Result<(), ContractError>;
}

/// Creates store functions of one kind from their [`FuncSpec`]
pub trait StoreFuncFactory: Send + Sync {
    /// Kind handled by this factory
    fn kind(&self) -> &str;

    /// Instantiate a store function
    ///
    /// # Errors
    /// Returns [`ContractError::InvalidParam`] for unusable parameters
    fn create(&self, spec: &FuncSpec) -> Result<Box<dyn StoreFunc>, ContractError>;
}
