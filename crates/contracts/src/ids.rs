//! Job / task / attempt identifiers
//!
//! `JobId` uses `Arc<str>` internally so every context copy made during binding
//! and validation clones it in O(1).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Job identifier with cheap cloning.
///
/// # Examples
/// ```
/// use contracts::JobId;
///
/// let id: JobId = "job_0001".into();
/// let id2 = id.clone();  // O(1) - just increments ref count
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "job_0001");
/// ```
#[derive(Clone, Default)]
pub struct JobId(Arc<str>);

impl JobId {
    /// Create a new JobId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for JobId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for JobId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JobId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for JobId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({:?})", self.0)
    }
}

impl PartialEq for JobId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for JobId {}

impl PartialEq<str> for JobId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JobId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Hash for JobId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for JobId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

/// Kind of task an attempt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// First-stage task
    Map,
    /// Second-stage task
    Reduce,
    /// Driver-side job setup
    JobSetup,
    /// Driver-side job cleanup / commit
    JobCleanup,
}

impl TaskKind {
    /// Single-letter code used in attempt ids and part file names
    pub fn code(self) -> char {
        match self {
            TaskKind::Map => 'm',
            TaskKind::Reduce => 'r',
            TaskKind::JobSetup => 's',
            TaskKind::JobCleanup => 'c',
        }
    }
}

/// A logical unit of work: one partition of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub kind: TaskKind,
    pub partition: u32,
}

impl TaskId {
    pub fn new(kind: TaskKind, partition: u32) -> Self {
        Self { kind, partition }
    }

    pub fn map(partition: u32) -> Self {
        Self::new(TaskKind::Map, partition)
    }

    pub fn reduce(partition: u32) -> Self {
        Self::new(TaskKind::Reduce, partition)
    }
}

/// One execution attempt of a task.
///
/// Several attempts of the same `TaskId` may run at once; `ordinal`
/// distinguishes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskAttemptId {
    pub job: JobId,
    pub task: TaskId,
    pub ordinal: u32,
}

impl TaskAttemptId {
    pub fn new(job: JobId, task: TaskId, ordinal: u32) -> Self {
        Self { job, task, ordinal }
    }
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt_{}_{}_{:06}_{}",
            self.job,
            self.task.kind.code(),
            self.task.partition,
            self.ordinal
        )
    }
}
