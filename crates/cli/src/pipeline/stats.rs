//! Job statistics.

use std::time::Duration;

use observability::JobMetricsAggregator;

/// Statistics from a job run
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    /// Input records read
    pub records_read: u64,

    /// Stores the job wrote to
    pub stores: usize,

    /// Total duration of the job, setup to commit
    pub duration: Duration,

    /// Per-attempt metrics aggregator
    pub metrics: JobMetricsAggregator,
}

impl JobStats {
    pub fn new(stores: usize) -> Self {
        Self {
            stores,
            ..Self::default()
        }
    }

    /// Input records per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.records_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of attempts that were thrown away, in percent
    pub fn wasted_attempt_rate(&self) -> f64 {
        let m = &self.metrics;
        let total = m.tasks_committed + m.attempts_aborted + m.attempts_failed;
        if total > 0 {
            ((m.attempts_aborted + m.attempts_failed) as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Job Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records read: {}", self.records_read);
        println!("   ├─ Records/s: {:.2}", self.records_per_sec());
        println!("   ├─ Stores: {}", self.stores);
        println!("   └─ Wasted attempts: {:.2}%", self.wasted_attempt_rate());

        println!("\n{}", self.metrics.summary());
    }
}
