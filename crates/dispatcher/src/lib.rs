//! # Dispatcher
//!
//! 多存储输出模块。
//!
//! 负责：
//! - 从配置中解析 map / reduce 两个角色的存储列表
//! - 按存储数量选择 Single / Multi 模式并返回对应的 writer
//! - 为每个存储绑定隔离的输出位置，提交前校验输出配置
//! - 逐存储提交 / 回滚，一个存储失败不影响其他存储

pub mod binder;
pub mod committer;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod registry;
pub mod session;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use committer::{AuthorityState, CommitCoordinator, StoreAuthority};
pub use dispatcher::{Mode, StoreOutputFormat, StorePlan};
pub use error::{OutputError, StoreFailure};
pub use metrics::{MetricsSnapshot, StoreMetrics};
pub use proxy::RoutingWriter;
pub use registry::{ResolvedStore, StoreCatalog};
pub use session::StoreSession;
