//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Job plan or input file not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// A task had no successful attempt
    #[error("Task {task} failed: no attempt out of {attempts} succeeded ({message})")]
    TaskFailed {
        task: u32,
        attempts: u32,
        message: String,
    },

    /// Job did not finish within its timeout
    #[error("Job timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Job stopped by Ctrl+C / SIGTERM
    #[error("Job interrupted")]
    Interrupted,

    /// Output layer error
    #[error(transparent)]
    Output(#[from] dispatcher::OutputError),

    /// Contract error (plan loading, store plugins)
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn task_failed(task: u32, attempts: u32, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            task,
            attempts,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
