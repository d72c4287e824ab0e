//! 配置校验模块
//!
//! 校验规则：
//! - job.name 非空
//! - tasks >= 1, speculative_attempts >= 1
//! - 至少一个存储
//! - 存储名称非空且唯一
//! - 存储 kind / location 非空
//! - 存储 location 跨角色唯一（规范化后比较）

use std::collections::{HashMap, HashSet};

use contracts::staging::normalize_location;
use contracts::{ContractError, JobPlan};

/// 校验 JobPlan 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(plan: &JobPlan) -> Result<(), ContractError> {
    validate_job(plan)?;
    validate_store_names(plan)?;
    validate_store_fields(plan)?;
    Ok(())
}

/// 校验作业设置
fn validate_job(plan: &JobPlan) -> Result<(), ContractError> {
    let job = &plan.job;
    if job.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "job.name",
            "job name cannot be empty",
        ));
    }
    if job.tasks == 0 {
        return Err(ContractError::config_validation(
            "job.tasks",
            "tasks must be >= 1",
        ));
    }
    if job.speculative_attempts == 0 {
        return Err(ContractError::config_validation(
            "job.speculative_attempts",
            "speculative_attempts must be >= 1",
        ));
    }
    Ok(())
}

/// 校验存储名称唯一性
fn validate_store_names(plan: &JobPlan) -> Result<(), ContractError> {
    if plan.stores.is_empty() {
        return Err(ContractError::config_validation(
            "stores",
            "at least one store is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, store) in plan.stores.iter().enumerate() {
        if store.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("stores[{}].name", idx),
                "store name cannot be empty",
            ));
        }
        if !seen.insert(store.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("stores[name={}]", store.name),
                "duplicate store name",
            ));
        }
    }
    Ok(())
}

/// 校验存储必填字段
///
/// 两个存储共用一个 location 会写入同一个暂存文件，第二个存储被拒绝。
fn validate_store_fields(plan: &JobPlan) -> Result<(), ContractError> {
    let mut locations = HashMap::new();
    for store in &plan.stores {
        if store.func.kind.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("stores[{}].func.kind", store.name),
                "store kind cannot be empty",
            ));
        }
        if store.location.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("stores[{}].location", store.name),
                "store location cannot be empty",
            ));
        }
        if let Some(first) = locations.insert(normalize_location(&store.location), &store.name) {
            return Err(ContractError::config_validation(
                format!("stores[{}].location", store.name),
                format!("location already used by store '{}'", first),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FuncSpec, JobSettings, PlanVersion, StoreDescriptor, StoreRole};

    fn plan_with(stores: Vec<StoreDescriptor>) -> JobPlan {
        JobPlan {
            version: PlanVersion::V1,
            job: JobSettings {
                name: "wc".into(),
                tasks: 1,
                speculative_attempts: 1,
                properties: Default::default(),
            },
            stores,
        }
    }

    fn store(name: &str, location: &str) -> StoreDescriptor {
        StoreDescriptor::new(name, FuncSpec::new("text"), location, StoreRole::Map)
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_plan() {
        let plan = plan_with(vec![store("a", "/o/a"), store("b", "/o/b")]);
        assert!(validate(&plan).is_ok());
    }

    #[test]
    fn test_zero_stores() {
        let err = validate(&plan_with(vec![])).unwrap_err();
        assert_eq!(field_of(err), "stores");
    }

    #[test]
    fn test_duplicate_store_name() {
        let plan = plan_with(vec![store("a", "/o/a"), store("a", "/o/b")]);
        let err = validate(&plan).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_location() {
        let plan = plan_with(vec![store("a", "  ")]);
        assert_eq!(field_of(validate(&plan).unwrap_err()), "stores[a].location");
    }

    #[test]
    fn test_duplicate_location_across_roles() {
        let mut counts = store("counts", "/o/shared/");
        counts.role = StoreRole::Reduce;
        let plan = plan_with(vec![store("words", "/o/shared"), store("other", "/o/b"), counts]);

        let err = validate(&plan).unwrap_err();
        assert!(err.to_string().contains("'words'"), "{err}");
        assert_eq!(field_of(err), "stores[counts].location");
    }

    #[test]
    fn test_empty_kind() {
        let mut bad = store("a", "/o/a");
        bad.func.kind.clear();
        assert_eq!(
            field_of(validate(&plan_with(vec![bad])).unwrap_err()),
            "stores[a].func.kind"
        );
    }

    #[test]
    fn test_zero_tasks_and_attempts() {
        let mut plan = plan_with(vec![store("a", "/o/a")]);
        plan.job.tasks = 0;
        assert_eq!(field_of(validate(&plan).unwrap_err()), "job.tasks");

        plan.job.tasks = 1;
        plan.job.speculative_attempts = 0;
        assert_eq!(
            field_of(validate(&plan).unwrap_err()),
            "job.speculative_attempts"
        );
    }
}
