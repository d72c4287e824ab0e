//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use contracts::{JobPlan, StoreDescriptor, StoreRole};

use crate::cli::InfoArgs;

/// Plan info for JSON output
#[derive(Serialize)]
struct PlanInfo {
    version: String,
    job: JobInfo,
    stores: Vec<StoreInfo>,
    available_kinds: Vec<String>,
}

#[derive(Serialize)]
struct JobInfo {
    name: String,
    tasks: u32,
    speculative_attempts: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct StoreInfo {
    name: String,
    kind: String,
    role: StoreRole,
    location: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading job plan info");

    if !args.config.exists() {
        anyhow::bail!("Job plan not found: {}", args.config.display());
    }

    let plan = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load plan from {}", args.config.display()))?;
    let kinds = available_kinds()?;

    if args.json {
        let info = build_plan_info(&plan, kinds, args.params);
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize plan info")?;
        println!("{}", json);
    } else {
        print_plan_info(&plan, &kinds, args.params);
    }

    Ok(())
}

fn available_kinds() -> Result<Vec<String>> {
    let catalog = stores::builtin_catalog().context("Failed to build store catalog")?;
    let kinds = catalog.kinds().into_iter().map(str::to_string).collect();
    Ok(kinds)
}

fn build_plan_info(plan: &JobPlan, available_kinds: Vec<String>, params: bool) -> PlanInfo {
    let store_info = |s: &StoreDescriptor| StoreInfo {
        name: s.name.clone(),
        kind: s.func.kind.clone(),
        role: s.role,
        location: s.location.clone(),
        params: if params {
            s.func.params.clone()
        } else {
            BTreeMap::new()
        },
    };

    PlanInfo {
        version: format!("{:?}", plan.version),
        job: JobInfo {
            name: plan.job.name.clone(),
            tasks: plan.job.tasks,
            speculative_attempts: plan.job.speculative_attempts,
            properties: plan.job.properties.clone(),
        },
        stores: plan.stores.iter().map(store_info).collect(),
        available_kinds,
    }
}

fn print_plan_info(plan: &JobPlan, kinds: &[String], params: bool) {
    println!("=== Job Plan ===\n");

    println!("Job");
    println!("   ├─ Version: {:?}", plan.version);
    println!("   ├─ Name: {}", plan.job.name);
    println!("   ├─ Tasks: {}", plan.job.tasks);
    println!(
        "   └─ Speculative attempts: {}",
        plan.job.speculative_attempts
    );

    for role in StoreRole::ALL {
        let stores = plan.stores_for(role);
        println!("\n{} stores ({})", role, stores.len());
        for (i, store) in stores.iter().enumerate() {
            let is_last = i == stores.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };
            let known = if kinds.iter().any(|k| k == &store.func.kind) {
                ""
            } else {
                " [unknown kind]"
            };

            println!(
                "   {} {} ({}{}) -> {}",
                prefix, store.name, store.func.kind, known, store.location
            );
            if params {
                for (key, value) in &store.func.params {
                    println!("   {}  {} = {}", child_prefix, key, value);
                }
            }
        }
    }

    println!("\nAvailable store kinds: {}", kinds.join(", "));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FuncSpec, JobSettings, PlanVersion};

    fn plan() -> JobPlan {
        JobPlan {
            version: PlanVersion::V1,
            job: JobSettings {
                name: "wc".into(),
                tasks: 2,
                speculative_attempts: 1,
                properties: BTreeMap::new(),
            },
            stores: vec![StoreDescriptor::new(
                "rows",
                FuncSpec::new("json").with_param("fields", "word,count"),
                "/out/rows",
                StoreRole::Reduce,
            )],
        }
    }

    #[test]
    fn test_params_hidden_by_default() {
        let info = build_plan_info(&plan(), vec!["json".into()], false);
        assert!(info.stores[0].params.is_empty());

        let info = build_plan_info(&plan(), vec!["json".into()], true);
        assert_eq!(info.stores[0].params.get("fields").unwrap(), "word,count");
    }

    #[test]
    fn test_available_kinds() {
        assert_eq!(available_kinds().unwrap(), vec!["json", "log", "text"]);
    }
}
