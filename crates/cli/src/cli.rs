//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Multistore - run jobs whose output goes to several independently committed stores
#[derive(Parser, Debug)]
#[command(
    name = "multistore",
    author,
    version,
    about = "Multi-store job output with speculative attempts",
    long_about = "Runs a job whose records are written to one or more stores.\n\n\
                  Every task may run several speculative attempts; each attempt stages \n\
                  its output privately, the first successful attempt per task is \n\
                  committed and the others are aborted."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MULTISTORE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MULTISTORE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a job over an input file
    Run(RunArgs),

    /// Validate a job plan and every store's output spec without running
    Validate(ValidateArgs),

    /// Display job plan information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to job plan (TOML or JSON)
    #[arg(short, long, default_value = "plan.toml", env = "MULTISTORE_PLAN")]
    pub config: PathBuf,

    /// Input file, one record per line
    #[arg(short, long, env = "MULTISTORE_INPUT")]
    pub input: PathBuf,

    /// Field delimiter of input lines
    #[arg(long, default_value = "\t")]
    pub delimiter: char,

    /// Job id (default: generated from the current time)
    #[arg(long, env = "MULTISTORE_JOB_ID")]
    pub job_id: Option<String>,

    /// Override speculative attempts per task from the plan
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Job timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "MULTISTORE_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "MULTISTORE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to job plan to validate
    #[arg(short, long, default_value = "plan.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,

    /// Only validate the plan itself, skip the stores' output spec checks
    #[arg(long)]
    pub plan_only: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to job plan
    #[arg(short, long, default_value = "plan.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show store function parameters
    #[arg(long)]
    pub params: bool,
}

impl Cli {
    /// Log level used when `RUST_LOG` is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Logging setup for this invocation; the Prometheus listener is started
    /// by `run --metrics-port` instead
    pub fn observability_config(&self) -> observability::ObservabilityConfig {
        observability::ObservabilityConfig {
            log_format: self.log_format.clone().into(),
            metrics_port: None,
            default_log_level: self.default_log_level().to_string(),
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
