//! Job execution module.

mod runner;
mod stats;

pub use runner::{JobConfig, JobRunner};
