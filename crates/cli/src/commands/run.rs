//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::JobId;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{JobConfig, JobRunner};

/// Execute the `run` command
pub async fn run_job(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading job plan");

    if !args.config.exists() {
        return Err(CliError::file_not_found(args.config.display().to_string()).into());
    }

    let plan = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load plan from {}", args.config.display()))?;

    let attempts = match args.attempts {
        Some(0) => anyhow::bail!("--attempts must be >= 1"),
        Some(n) => {
            info!(attempts = n, "Overriding speculative attempts from CLI");
            n
        }
        None => plan.job.speculative_attempts,
    };

    let job_id = args
        .job_id
        .clone()
        .map(JobId::from)
        .unwrap_or_else(generate_job_id);

    info!(
        job = %plan.job.name,
        job_id = %job_id,
        stores = plan.stores.len(),
        tasks = plan.job.tasks,
        attempts,
        "Job plan loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let catalog = stores::builtin_catalog().context("Failed to build store catalog")?;
    let runner = JobRunner::new(
        JobConfig {
            plan,
            job_id,
            input: args.input.clone(),
            delimiter: args.delimiter,
            attempts,
            timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
        },
        catalog,
    )?;

    // a cancelled job is still awaited until its attempts are drained
    let job = runner.run();
    tokio::pin!(job);
    let result = tokio::select! {
        result = &mut job => result,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, cancelling job...");
            runner.cancel();
            job.await
        }
    };

    match result {
        Ok(stats) => {
            info!(
                job_id = %runner.job().job_id(),
                records = stats.records_read,
                duration_secs = stats.duration.as_secs_f64(),
                "Job completed successfully"
            );
            stats.print_summary();
            Ok(())
        }
        Err(e @ (CliError::Timeout { .. } | CliError::Interrupted)) => {
            warn!(error = %e, "Job stopped, output aborted");
            Err(e.into())
        }
        Err(e) => Err(e).context("Job execution failed"),
    }
}

/// Time-based job id, e.g. `job_20240131120501`
fn generate_job_id() -> JobId {
    JobId::from(format!("job_{}", chrono::Local::now().format("%Y%m%d%H%M%S")))
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never
/// resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
