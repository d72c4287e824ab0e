//! # Contracts
//!
//! Frozen interface contracts shared by the output layer, the store plugins and
//! the CLI. All business crates depend on this crate, reverse dependencies are
//! prohibited.
//!
//! ## Execution model
//! - A job runs many task attempts, possibly several for the same partition
//!   (speculative execution). Only one attempt per partition is committed.
//! - Every attempt owns its [`TaskAttemptContext`] exclusively; configuration
//!   changes flow through [`ConfigScope`] / [`ConfigDelta`] and are merged
//!   explicitly.

mod configuration;
mod context;
mod descriptor;
mod error;
mod ids;
mod plan;
pub mod staging;
mod store;
mod tuple;

pub use configuration::*;
pub use context::*;
pub use descriptor::*;
pub use error::*;
pub use ids::{JobId, TaskAttemptId, TaskId, TaskKind};
pub use plan::*;
pub use store::*;
pub use tuple::*;
