//! Job and task-attempt contexts
//!
//! Contexts are owned by the execution runtime. Cloning one yields an
//! isolated copy: same identity, independent configuration.

use crate::{Configuration, JobId, TaskAttemptId, TASK_ATTEMPT_KEY, TASK_PARTITION_KEY};

/// Job-wide context: identity plus configuration
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    conf: Configuration,
}

impl JobContext {
    pub fn new(job_id: JobId, conf: Configuration) -> Self {
        Self { job_id, conf }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn conf(&self) -> &Configuration {
        &self.conf
    }

    pub fn conf_mut(&mut self) -> &mut Configuration {
        &mut self.conf
    }

    /// Fresh configuration clone under the same job identity
    pub fn isolated_copy(&self) -> Self {
        self.clone()
    }
}

/// Context of one task attempt
#[derive(Debug, Clone)]
pub struct TaskAttemptContext {
    attempt: TaskAttemptId,
    conf: Configuration,
}

impl TaskAttemptContext {
    /// Create an attempt context. The attempt identity is published into the
    /// configuration so store plugins can read it like any other setting.
    pub fn new(attempt: TaskAttemptId, mut conf: Configuration) -> Self {
        conf.set(TASK_PARTITION_KEY, attempt.task.partition.to_string());
        conf.set(TASK_ATTEMPT_KEY, attempt.to_string());
        Self { attempt, conf }
    }

    /// Attempt context derived from a job context
    pub fn for_job(job: &JobContext, task: crate::TaskId, ordinal: u32) -> Self {
        Self::new(
            TaskAttemptId::new(job.job_id().clone(), task, ordinal),
            job.conf().clone(),
        )
    }

    pub fn attempt(&self) -> &TaskAttemptId {
        &self.attempt
    }

    pub fn job_id(&self) -> &JobId {
        &self.attempt.job
    }

    pub fn conf(&self) -> &Configuration {
        &self.conf
    }

    pub fn conf_mut(&mut self) -> &mut Configuration {
        &mut self.conf
    }

    /// Job-level view of this attempt's configuration
    pub fn job_view(&self) -> JobContext {
        JobContext::new(self.attempt.job.clone(), self.conf.clone())
    }

    /// Fresh configuration clone under the same attempt identity
    pub fn isolated_copy(&self) -> Self {
        self.clone()
    }
}
