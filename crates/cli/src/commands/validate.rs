//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use contracts::{JobContext, JobId, JobPlan, StoreRole};
use dispatcher::StoreOutputFormat;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_stores: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<PlanSummary>,
}

#[derive(Serialize)]
struct PlanSummary {
    version: String,
    job: String,
    tasks: u32,
    speculative_attempts: u32,
    map_stores: usize,
    reduce_stores: usize,
}

impl ValidationResult {
    fn invalid(config_path: String, error: String, failed_stores: Vec<String>) -> Self {
        Self {
            valid: false,
            config_path,
            error: Some(error),
            failed_stores,
            warnings: None,
            summary: None,
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating job plan");

    let result = validate_plan(args);
    observability::record_validation(result.valid);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Job plan validation failed")
    }
}

fn validate_plan(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        let error = format!("File not found: {}", args.config.display());
        return ValidationResult::invalid(config_path, error, Vec::new());
    }

    let plan = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(plan) => plan,
        Err(e) => return ValidationResult::invalid(config_path, e.to_string(), Vec::new()),
    };

    if !args.plan_only {
        if let Err((error, failed_stores)) = check_stores(&plan) {
            return ValidationResult::invalid(config_path, error, failed_stores);
        }
    }

    let warnings = collect_warnings(&plan);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        failed_stores: Vec::new(),
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(PlanSummary {
            version: format!("{:?}", plan.version),
            job: plan.job.name.clone(),
            tasks: plan.job.tasks,
            speculative_attempts: plan.job.speculative_attempts,
            map_stores: plan.stores_for(StoreRole::Map).len(),
            reduce_stores: plan.stores_for(StoreRole::Reduce).len(),
        }),
    }
}

/// Run every store's output spec check against a throwaway job context
fn check_stores(plan: &JobPlan) -> std::result::Result<(), (String, Vec<String>)> {
    let no_stores = |e: String| (e, Vec::new());

    let conf = plan.to_configuration().map_err(|e| no_stores(e.to_string()))?;
    let catalog = stores::builtin_catalog().map_err(|e| no_stores(e.to_string()))?;
    let format = StoreOutputFormat::new(Arc::new(catalog));
    let job = JobContext::new(JobId::new("job_validate"), conf);

    format.check_output_specs(&job).map_err(|e| {
        let failed = e.failed_stores().into_iter().map(str::to_string).collect();
        (e.to_string(), failed)
    })
}

/// Collect plan warnings (non-fatal issues)
fn collect_warnings(plan: &JobPlan) -> Vec<String> {
    let mut warnings = Vec::new();

    if !plan.stores_for(StoreRole::Reduce).is_empty() {
        warnings.push(
            "Reduce stores are written by map tasks under `run` (map-only execution)".to_string(),
        );
    }

    if plan.job.speculative_attempts > plan.job.tasks.saturating_mul(4) {
        warnings.push(format!(
            "speculative_attempts ({}) is high relative to tasks ({})",
            plan.job.speculative_attempts, plan.job.tasks
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Job plan is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Job: {}", summary.job);
            println!("  Tasks: {}", summary.tasks);
            println!("  Speculative attempts: {}", summary.speculative_attempts);
            println!("  Map stores: {}", summary.map_stores);
            println!("  Reduce stores: {}", summary.reduce_stores);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Job plan is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
        if !result.failed_stores.is_empty() {
            println!("  Failed stores: {}", result.failed_stores.join(", "));
        }
    }
}
