//! Commit Coordinator - one commit authority per store of an attempt

use contracts::{
    JobContext, OutputCommitter, StoreDescriptor, StoreRole, TaskAttemptContext, TaskId, TaskKind,
};
use tracing::{debug, info, instrument, warn};

use crate::binder;
use crate::dispatcher::Mode;
use crate::error::{OutputError, StoreFailure};
use crate::registry::{self, StoreCatalog};

/// Commit state of one store authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityState {
    Pending,
    Committed,
    Aborted,
}

/// Commit authority of one store: its own committer plus the isolated,
/// location-bound attempt context the committer works against
pub struct StoreAuthority {
    descriptor: StoreDescriptor,
    ctx: TaskAttemptContext,
    committer: Box<dyn OutputCommitter>,
    state: AuthorityState,
}

impl StoreAuthority {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn role(&self) -> StoreRole {
        self.descriptor.role
    }

    pub fn descriptor(&self) -> &StoreDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> AuthorityState {
        self.state
    }

    /// Attempt context with this store's location bound
    pub fn context(&self) -> &TaskAttemptContext {
        &self.ctx
    }

    pub fn setup_task(&mut self) -> Result<(), OutputError> {
        self.committer
            .setup_task(&self.ctx)
            .map_err(|e| OutputError::store(&self.descriptor.name, e))
    }

    /// Whether this store has staged output to promote. Always false once
    /// committed or aborted.
    pub fn needs_task_commit(&self) -> Result<bool, OutputError> {
        if self.state != AuthorityState::Pending {
            return Ok(false);
        }
        self.committer
            .needs_task_commit(&self.ctx)
            .map_err(|e| OutputError::store(&self.descriptor.name, e))
    }

    /// Promote this store's staged output. Committing twice is a no-op.
    ///
    /// # Errors
    /// [`OutputError::InvariantViolation`] after an abort
    pub fn commit_task(&mut self) -> Result<(), OutputError> {
        match self.state {
            AuthorityState::Committed => Ok(()),
            AuthorityState::Aborted => Err(OutputError::invariant(format!(
                "store '{}' cannot commit attempt {}: already aborted",
                self.descriptor.name,
                self.ctx.attempt()
            ))),
            AuthorityState::Pending => {
                self.committer
                    .commit_task(&self.ctx)
                    .map_err(|e| OutputError::store(&self.descriptor.name, e))?;
                self.state = AuthorityState::Committed;
                debug!(store = %self.descriptor.name, attempt = %self.ctx.attempt(), "Task committed");
                Ok(())
            }
        }
    }

    /// Discard this store's staged output. Aborting twice is a no-op.
    ///
    /// # Errors
    /// [`OutputError::InvariantViolation`] after a commit
    pub fn abort_task(&mut self) -> Result<(), OutputError> {
        match self.state {
            AuthorityState::Aborted => Ok(()),
            AuthorityState::Committed => Err(OutputError::invariant(format!(
                "store '{}' cannot abort attempt {}: already committed",
                self.descriptor.name,
                self.ctx.attempt()
            ))),
            AuthorityState::Pending => {
                self.committer
                    .abort_task(&self.ctx)
                    .map_err(|e| OutputError::store(&self.descriptor.name, e))?;
                self.state = AuthorityState::Aborted;
                debug!(store = %self.descriptor.name, attempt = %self.ctx.attempt(), "Task aborted");
                Ok(())
            }
        }
    }

    pub fn setup_job(&mut self) -> Result<(), OutputError> {
        let job = self.ctx.job_view();
        self.committer
            .setup_job(&job)
            .map_err(|e| OutputError::store(&self.descriptor.name, e))
    }

    pub fn commit_job(&mut self) -> Result<(), OutputError> {
        let job = self.ctx.job_view();
        self.committer
            .commit_job(&job)
            .map_err(|e| OutputError::store(&self.descriptor.name, e))
    }

    pub fn abort_job(&mut self) -> Result<(), OutputError> {
        let job = self.ctx.job_view();
        self.committer
            .abort_job(&job)
            .map_err(|e| OutputError::store(&self.descriptor.name, e))
    }
}

impl std::fmt::Debug for StoreAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAuthority")
            .field("store", &self.descriptor.name)
            .field("attempt", &self.ctx.attempt().to_string())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// The commit authorities of one attempt, map stores first.
///
/// Holds nothing shared between stores: each authority commits or aborts on
/// its own. Aggregate operations visit every authority and report all
/// failures together.
#[derive(Debug)]
pub struct CommitCoordinator {
    authorities: Vec<StoreAuthority>,
}

impl CommitCoordinator {
    /// Build one authority per store of `ctx`'s store lists
    #[instrument(name = "commit_authority_for", skip_all, fields(attempt = %ctx.attempt()))]
    pub fn for_attempt(
        ctx: &TaskAttemptContext,
        catalog: &StoreCatalog,
    ) -> Result<Self, OutputError> {
        let stores = registry::resolve_all(ctx.conf(), catalog)?;
        let mut authorities = Vec::with_capacity(stores.len());
        for mut store in stores {
            let bound = binder::bind_attempt(ctx, &mut store)?;
            let committer = store
                .func
                .output_mechanism()
                .output_committer(&bound)
                .map_err(|e| OutputError::store(store.name(), e))?;
            authorities.push(StoreAuthority {
                descriptor: store.descriptor,
                ctx: bound,
                committer,
                state: AuthorityState::Pending,
            });
        }
        debug!(stores = authorities.len(), "Commit authorities created");
        Ok(Self { authorities })
    }

    /// Authorities for job-level setup or cleanup, run under a `kind` task
    pub fn for_job(
        job: &JobContext,
        kind: TaskKind,
        catalog: &StoreCatalog,
    ) -> Result<Self, OutputError> {
        let ctx = TaskAttemptContext::for_job(job, TaskId::new(kind, 0), 0);
        Self::for_attempt(&ctx, catalog)
    }

    pub fn len(&self) -> usize {
        self.authorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorities.is_empty()
    }

    /// Mode implied by the number of authorities
    pub fn mode(&self) -> Option<Mode> {
        Mode::for_count(self.authorities.len())
    }

    pub fn authorities(&self) -> &[StoreAuthority] {
        &self.authorities
    }

    pub fn authority(&self, store: &str) -> Option<&StoreAuthority> {
        self.authorities.iter().find(|a| a.name() == store)
    }

    pub fn authority_mut(&mut self, store: &str) -> Option<&mut StoreAuthority> {
        self.authorities.iter_mut().find(|a| a.name() == store)
    }

    pub fn into_authorities(self) -> Vec<StoreAuthority> {
        self.authorities
    }

    pub fn setup_task(&mut self) -> Result<(), OutputError> {
        self.fan_out("setup_task", StoreAuthority::setup_task)
    }

    /// True if any store has staged output to promote
    pub fn needs_task_commit(&self) -> Result<bool, OutputError> {
        let mut needed = false;
        let mut failures = Vec::new();
        for authority in &self.authorities {
            match authority.needs_task_commit() {
                Ok(n) => needed |= n,
                Err(error) => failures.push(StoreFailure {
                    store: authority.name().to_string(),
                    error,
                }),
            }
        }
        if failures.is_empty() {
            Ok(needed)
        } else {
            Err(OutputError::PerStore {
                operation: "needs_task_commit",
                failures,
            })
        }
    }

    #[instrument(name = "commit_task", skip(self), fields(stores = self.authorities.len()))]
    pub fn commit_task(&mut self) -> Result<(), OutputError> {
        self.fan_out("commit_task", StoreAuthority::commit_task)?;
        info!("Task output committed");
        Ok(())
    }

    /// Abort every store. Safe to call when nothing was written or the
    /// attempt was already aborted.
    #[instrument(name = "abort_task", skip(self), fields(stores = self.authorities.len()))]
    pub fn abort_task(&mut self) -> Result<(), OutputError> {
        self.fan_out("abort_task", StoreAuthority::abort_task)
    }

    pub fn setup_job(&mut self) -> Result<(), OutputError> {
        self.fan_out("setup_job", StoreAuthority::setup_job)
    }

    #[instrument(name = "commit_job", skip(self), fields(stores = self.authorities.len()))]
    pub fn commit_job(&mut self) -> Result<(), OutputError> {
        self.fan_out("commit_job", StoreAuthority::commit_job)?;
        info!("Job output committed");
        Ok(())
    }

    pub fn abort_job(&mut self) -> Result<(), OutputError> {
        self.fan_out("abort_job", StoreAuthority::abort_job)
    }

    fn fan_out(
        &mut self,
        operation: &'static str,
        mut op: impl FnMut(&mut StoreAuthority) -> Result<(), OutputError>,
    ) -> Result<(), OutputError> {
        let mut failures = Vec::new();
        for authority in &mut self.authorities {
            if let Err(error) = op(authority) {
                warn!(store = %authority.name(), operation, error = %error, "Store operation failed");
                failures.push(StoreFailure {
                    store: authority.name().to_string(),
                    error,
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(OutputError::PerStore {
                operation,
                failures,
            })
        }
    }
}
