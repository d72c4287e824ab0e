//! 多存储输出指标收集模块
//!
//! 记录写入、校验、任务提交/回滚等指标，并在内存中聚合作业摘要。

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// 记录某个存储写入的记录数
pub fn record_records_written(store: &str, count: u64) {
    counter!(
        "multistore_records_written_total",
        "store" => store.to_string()
    )
    .increment(count);
}

/// 记录写入失败
pub fn record_write_failures(store: &str, count: u64) {
    if count > 0 {
        counter!(
            "multistore_write_failures_total",
            "store" => store.to_string()
        )
        .increment(count);
    }
}

/// 记录输出配置校验结果
pub fn record_validation(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "multistore_validations_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录任务提交
pub fn record_task_commit(stores: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "multistore_task_commits_total",
        "status" => status.to_string()
    )
    .increment(1);
    gauge!("multistore_stores_per_task").set(stores as f64);
}

/// 记录任务尝试回滚 (推测执行落选或失败)
pub fn record_task_abort(reason: &str) {
    counter!(
        "multistore_task_aborts_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录单次任务尝试耗时
pub fn record_attempt_duration_ms(duration_ms: f64) {
    histogram!("multistore_attempt_duration_ms").record(duration_ms);
}

/// 作业指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct JobMetricsAggregator {
    /// 已提交任务数
    pub tasks_committed: u64,

    /// 回滚的尝试数
    pub attempts_aborted: u64,

    /// 失败的尝试数
    pub attempts_failed: u64,

    /// 各存储写入记录数 (仅统计已提交的尝试)
    pub records_written: BTreeMap<String, u64>,

    /// 尝试耗时统计 (毫秒)
    pub attempt_duration: RunningStats,
}

impl JobMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次已提交的尝试
    pub fn committed<'a>(
        &mut self,
        duration_ms: f64,
        written: impl IntoIterator<Item = (&'a str, u64)>,
    ) {
        self.tasks_committed += 1;
        self.attempt_duration.push(duration_ms);
        for (store, count) in written {
            *self.records_written.entry(store.to_string()).or_insert(0) += count;
        }
    }

    /// 记录一次回滚的尝试
    pub fn aborted(&mut self, duration_ms: f64) {
        self.attempts_aborted += 1;
        self.attempt_duration.push(duration_ms);
    }

    /// 记录一次失败的尝试
    pub fn failed(&mut self) {
        self.attempts_failed += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            tasks_committed: self.tasks_committed,
            attempts_aborted: self.attempts_aborted,
            attempts_failed: self.attempts_failed,
            records_written: self.records_written.clone(),
            attempt_duration_ms: StatsSummary::from(&self.attempt_duration),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub tasks_committed: u64,
    pub attempts_aborted: u64,
    pub attempts_failed: u64,
    pub records_written: BTreeMap<String, u64>,
    pub attempt_duration_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Job Metrics Summary ===")?;
        writeln!(f, "Tasks committed: {}", self.tasks_committed)?;
        writeln!(f, "Attempts aborted: {}", self.attempts_aborted)?;
        writeln!(f, "Attempts failed: {}", self.attempts_failed)?;
        writeln!(f, "Attempt duration (ms): {}", self.attempt_duration_ms)?;

        if !self.records_written.is_empty() {
            writeln!(f, "Records written:")?;
            for (store, count) in &self.records_written {
                writeln!(f, "  {}: {}", store, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [10.0, 20.0, 30.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 3);
        assert!((stats.mean() - 20.0).abs() < 1e-10);
        assert!((stats.variance() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts_committed_records_only() {
        let mut aggregator = JobMetricsAggregator::new();
        aggregator.committed(12.0, [("words", 5), ("counts", 2)]);
        aggregator.committed(8.0, [("words", 3)]);
        aggregator.aborted(15.0);
        aggregator.failed();

        let summary = aggregator.summary();
        assert_eq!(summary.tasks_committed, 2);
        assert_eq!(summary.attempts_aborted, 1);
        assert_eq!(summary.attempts_failed, 1);
        assert_eq!(summary.records_written.get("words"), Some(&8));
        assert_eq!(summary.attempt_duration_ms.count, 3);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = JobMetricsAggregator::new();
        aggregator.committed(5.0, [("words", 4)]);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Tasks committed: 1"));
        assert!(output.contains("words: 4"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_records_written("words", 3);
        record_write_failures("words", 0);
        record_validation(true);
        record_task_commit(2, false);
        record_task_abort("speculative");
        record_attempt_duration_ms(1.5);
    }
}
