//! JobPlan - Config Loader 输出
//!
//! 描述一个作业：任务数、推测执行副本数、作业属性以及输出存储列表。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{encode_store_list, Configuration, ContractError, StoreDescriptor, StoreRole};

/// Job name as seen by stores
pub const JOB_NAME_KEY: &str = "multistore.job.name";

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlanVersion {
    #[default]
    V1,
}

/// 完整的作业计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPlan {
    /// 配置版本
    #[serde(default)]
    pub version: PlanVersion,

    /// 作业设置
    pub job: JobSettings,

    /// 输出存储列表 (按声明顺序)
    pub stores: Vec<StoreDescriptor>,
}

/// 作业设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    /// 作业名称
    pub name: String,

    /// 任务 (分区) 数量
    #[serde(default = "default_tasks")]
    pub tasks: u32,

    /// 每个任务同时运行的尝试数 (推测执行)
    #[serde(default = "default_speculative_attempts")]
    pub speculative_attempts: u32,

    /// 额外的作业配置项，原样写入 Configuration
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_tasks() -> u32 {
    1
}

fn default_speculative_attempts() -> u32 {
    1
}

impl JobPlan {
    /// Stores of one role, in declaration order
    pub fn stores_for(&self, role: StoreRole) -> Vec<StoreDescriptor> {
        self.stores
            .iter()
            .filter(|s| s.role == role)
            .cloned()
            .collect()
    }

    /// Job configuration: properties, job name and both store lists.
    /// Both list keys are always written, empty lists included.
    pub fn to_configuration(&self) -> Result<Configuration, ContractError> {
        let mut conf: Configuration = self.job.properties.clone().into_iter().collect();
        conf.set(JOB_NAME_KEY, self.job.name.clone());
        for role in StoreRole::ALL {
            conf.set(role.config_key(), encode_store_list(&self.stores_for(role))?);
        }
        Ok(conf)
    }
}
