//! Job runner - map-only jobs with speculative attempts.
//!
//! Every task partition runs `attempts` concurrent attempts. Attempts stage
//! their output through the output layer; the first attempt of a partition
//! that finishes cleanly is committed and every later one is aborted. The job
//! is committed only when every partition has a committed attempt.
//!
//! Timeout and interrupt trip a shared [`Cancellation`]. Attempts stop before
//! their next writer or record, and the runner waits for every in-flight
//! attempt and aborts its output before aborting the job.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{JobContext, JobId, JobPlan, TaskAttemptContext, TaskId, TaskKind, Tuple};
use dispatcher::{CommitCoordinator, Mode, OutputError, StoreCatalog, StoreOutputFormat};
use observability::{
    record_attempt_duration_ms, record_records_written, record_task_abort, record_task_commit,
    record_validation, record_write_failures,
};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{CliError, Result};
use crate::pipeline::stats::JobStats;

/// Job runner configuration
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Loaded job plan
    pub plan: JobPlan,

    /// Job identity; every attempt id derives from it
    pub job_id: JobId,

    /// Input file, one record per line
    pub input: PathBuf,

    /// Field delimiter of input lines
    pub delimiter: char,

    /// Attempts per task
    pub attempts: u32,

    /// Limit on the task phase (None = unlimited)
    pub timeout: Option<Duration>,
}

/// Records written by one finished attempt, per store
type Written = Vec<(String, u64)>;

/// Outcome of one attempt; `Ok(None)` when it was cancelled and its output aborted
type AttemptResult = std::result::Result<Option<FinishedAttempt>, OutputError>;

/// An attempt that wrote all its records and awaits the commit decision
struct FinishedAttempt {
    partition: u32,
    ordinal: u32,
    coordinator: CommitCoordinator,
    written: Written,
    duration_ms: f64,
}

/// Cancellation flag shared by the runner and its attempts
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Cancellation {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`Cancellation::cancel`] has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Runs one job against a store catalog
pub struct JobRunner {
    config: JobConfig,
    format: StoreOutputFormat,
    job: JobContext,
    cancel: Cancellation,
}

impl JobRunner {
    /// Build the job context from the plan
    pub fn new(config: JobConfig, catalog: StoreCatalog) -> Result<Self> {
        let conf = config.plan.to_configuration()?;
        let job = JobContext::new(config.job_id.clone(), conf);
        Ok(Self {
            config,
            format: StoreOutputFormat::new(Arc::new(catalog)),
            job,
            cancel: Cancellation::default(),
        })
    }

    pub fn job(&self) -> &JobContext {
        &self.job
    }

    /// Ask a running job to stop. `run` still has to be awaited; it returns
    /// [`CliError::Interrupted`] once every attempt is drained and the job
    /// output is aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Validate, set up, run every task and commit the job
    #[instrument(name = "job_run", skip(self), fields(job = %self.job.job_id()))]
    pub async fn run(&self) -> Result<JobStats> {
        let start = Instant::now();
        let deadline = self
            .config
            .timeout
            .map(|limit| tokio::time::Instant::now() + limit);

        let validated = self.format.check_output_specs(&self.job);
        record_validation(validated.is_ok());
        validated?;

        let partitions = self.read_partitions().await?;

        CommitCoordinator::for_job(&self.job, TaskKind::JobSetup, self.format.catalog())?
            .setup_job()?;
        info!(
            stores = self.config.plan.stores.len(),
            tasks = self.config.plan.job.tasks,
            attempts = self.config.attempts,
            "Job set up"
        );

        let mut stats = JobStats::new(self.config.plan.stores.len());
        stats.records_read = partitions.iter().map(|p| p.len() as u64).sum();

        match self.run_tasks(partitions, deadline, &mut stats).await {
            Ok(()) => {
                CommitCoordinator::for_job(&self.job, TaskKind::JobCleanup, self.format.catalog())?
                    .commit_job()?;
                stats.duration = start.elapsed();
                info!(
                    tasks = stats.metrics.tasks_committed,
                    duration_secs = stats.duration.as_secs_f64(),
                    "Job committed"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(error = %e, "Job failed, aborting output");
                if let Err(abort_err) = self.abort_job() {
                    warn!(error = %abort_err, "Job abort reported failures");
                }
                Err(e)
            }
        }
    }

    /// Abort job-level output of every store
    fn abort_job(&self) -> Result<()> {
        CommitCoordinator::for_job(&self.job, TaskKind::JobCleanup, self.format.catalog())?
            .abort_job()?;
        info!(job = %self.job.job_id(), "Job output aborted");
        Ok(())
    }

    /// Read input records and deal them round-robin over the task partitions
    async fn read_partitions(&self) -> Result<Vec<Vec<Tuple>>> {
        if !self.config.input.exists() {
            return Err(CliError::file_not_found(
                self.config.input.display().to_string(),
            ));
        }
        let content = tokio::fs::read_to_string(&self.config.input).await?;
        Ok(partition_lines(
            &content,
            self.config.delimiter,
            self.config.plan.job.tasks,
        ))
    }

    /// Spawn every attempt and commit one winner per partition
    async fn run_tasks(
        &self,
        partitions: Vec<Vec<Tuple>>,
        deadline: Option<tokio::time::Instant>,
        stats: &mut JobStats,
    ) -> Result<()> {
        let attempts = self.config.attempts.max(1);
        let mut join_set = JoinSet::new();

        for (partition, records) in partitions.into_iter().enumerate() {
            let records = Arc::new(records);
            for ordinal in 0..attempts {
                let ctx = TaskAttemptContext::for_job(
                    &self.job,
                    TaskId::map(partition as u32),
                    ordinal,
                );
                let format = self.format.clone();
                let records = Arc::clone(&records);
                let cancel = self.cancel.clone();
                join_set.spawn_blocking(move || {
                    let partition = ctx.attempt().task.partition;
                    let ordinal = ctx.attempt().ordinal;
                    (partition, ordinal, run_attempt(&format, ctx, &records, &cancel))
                });
            }
        }

        let task_count = self.config.plan.job.tasks as usize;
        let mut committed = vec![false; task_count];
        let mut last_error: Vec<Option<String>> = vec![None; task_count];

        loop {
            let joined = tokio::select! {
                biased;
                reason = self.stop_requested(deadline) => {
                    warn!(reason = %reason, "Stopping job, draining in-flight attempts");
                    self.cancel.cancel();
                    self.drain(&mut join_set, stats).await;
                    return Err(reason);
                }
                joined = join_set.join_next() => joined,
            };
            let (partition, ordinal, outcome) = match joined {
                Some(Ok(attempt)) => attempt,
                Some(Err(e)) => {
                    error!(error = %e, "Attempt panicked, draining in-flight attempts");
                    self.cancel.cancel();
                    self.drain(&mut join_set, stats).await;
                    return Err(OutputError::invariant(format!("attempt panicked: {e}")).into());
                }
                None => break,
            };
            let slot = partition as usize;

            match outcome {
                Ok(Some(mut finished)) if !committed[slot] => {
                    match finished.coordinator.commit_task() {
                        Ok(()) => {
                            committed[slot] = true;
                            record_task_commit(finished.coordinator.len(), true);
                            for (store, count) in &finished.written {
                                record_records_written(store, *count);
                            }
                            stats.metrics.committed(
                                finished.duration_ms,
                                finished.written.iter().map(|(s, c)| (s.as_str(), *c)),
                            );
                            info!(partition, ordinal, "Attempt committed");
                        }
                        Err(e) => {
                            record_task_commit(finished.coordinator.len(), false);
                            warn!(partition, ordinal, error = %e, "Attempt commit failed");
                            abort_quietly(&mut finished.coordinator, partition, ordinal);
                            stats.metrics.failed();
                            last_error[slot] = Some(e.to_string());
                        }
                    }
                }
                Ok(Some(mut finished)) => {
                    debug!(
                        partition = finished.partition,
                        ordinal = finished.ordinal,
                        "Partition already committed, aborting speculative attempt"
                    );
                    abort_quietly(
                        &mut finished.coordinator,
                        finished.partition,
                        finished.ordinal,
                    );
                    record_task_abort("speculative");
                    stats.metrics.aborted(finished.duration_ms);
                }
                Ok(None) => record_task_abort("cancelled"),
                Err(e) => {
                    warn!(partition, ordinal, error = %e, "Attempt failed");
                    record_task_abort("failed");
                    stats.metrics.failed();
                    last_error[slot] = Some(e.to_string());
                }
            }
        }

        for (partition, done) in committed.iter().enumerate() {
            if !done {
                let message = last_error[partition]
                    .take()
                    .unwrap_or_else(|| "no attempt finished".to_string());
                return Err(CliError::task_failed(partition as u32, attempts, message));
            }
        }
        Ok(())
    }

    /// Resolves with the reason the job has to stop: an interrupt, or the
    /// deadline passing
    async fn stop_requested(&self, deadline: Option<tokio::time::Instant>) -> CliError {
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => CliError::Interrupted,
            _ = expired => CliError::Timeout {
                secs: self.config.timeout.map_or(0, |limit| limit.as_secs()),
            },
        }
    }

    /// Wait for every in-flight attempt and abort whatever it staged
    async fn drain(
        &self,
        join_set: &mut JoinSet<(u32, u32, AttemptResult)>,
        stats: &mut JobStats,
    ) {
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((partition, ordinal, Ok(Some(mut finished)))) => {
                    abort_quietly(&mut finished.coordinator, partition, ordinal);
                    record_task_abort("cancelled");
                    stats.metrics.aborted(finished.duration_ms);
                }
                Ok((_, _, Ok(None))) => record_task_abort("cancelled"),
                Ok((partition, ordinal, Err(e))) => {
                    debug!(partition, ordinal, error = %e, "Attempt failed while draining");
                    stats.metrics.failed();
                }
                Err(e) => warn!(error = %e, "Attempt panicked while draining"),
            }
        }
        info!("In-flight attempts drained");
    }
}

/// Split input into `tasks` partitions, record `i` going to partition `i % tasks`.
/// Blank lines are skipped.
fn partition_lines(content: &str, delimiter: char, tasks: u32) -> Vec<Vec<Tuple>> {
    let tasks = tasks.max(1) as usize;
    let mut partitions = vec![Vec::new(); tasks];
    for (idx, line) in content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
    {
        partitions[idx % tasks].push(Tuple::parse_line(line, delimiter));
    }
    partitions
}

fn abort_quietly(coordinator: &mut CommitCoordinator, partition: u32, ordinal: u32) {
    if let Err(e) = coordinator.abort_task() {
        warn!(partition, ordinal, error = %e, "Attempt abort reported failures");
    }
}

/// Run one attempt to the point of the commit decision. On failure or
/// cancellation the attempt's own output is aborted before returning.
fn run_attempt(
    format: &StoreOutputFormat,
    mut ctx: TaskAttemptContext,
    records: &[Tuple],
    cancel: &Cancellation,
) -> AttemptResult {
    let start = Instant::now();
    let mut coordinator = format.output_committer(&ctx)?;

    match write_attempt(format, &mut ctx, &mut coordinator, records, cancel) {
        Ok(Some(written)) => {
            let elapsed = start.elapsed();
            record_attempt_duration_ms(duration_ms(elapsed));
            Ok(Some(FinishedAttempt {
                partition: ctx.attempt().task.partition,
                ordinal: ctx.attempt().ordinal,
                coordinator,
                written,
                duration_ms: duration_ms(elapsed),
            }))
        }
        Ok(None) => {
            debug!(attempt = %ctx.attempt(), "Attempt cancelled, aborting its output");
            if let Err(abort_err) = coordinator.abort_task() {
                warn!(attempt = %ctx.attempt(), error = %abort_err, "Abort after cancellation reported failures");
            }
            Ok(None)
        }
        Err(e) => {
            for store in e.failed_stores() {
                record_write_failures(store, 1);
            }
            if let Err(abort_err) = coordinator.abort_task() {
                warn!(attempt = %ctx.attempt(), error = %abort_err, "Abort after failure reported failures");
            }
            Err(e)
        }
    }
}

/// `Ok(None)` when `cancel` tripped; writers opened so far are dropped
/// unclosed and the caller aborts the attempt.
fn write_attempt(
    format: &StoreOutputFormat,
    ctx: &mut TaskAttemptContext,
    coordinator: &mut CommitCoordinator,
    records: &[Tuple],
    cancel: &Cancellation,
) -> std::result::Result<Option<Written>, OutputError> {
    coordinator.setup_task()?;
    if cancel.is_cancelled() {
        return Ok(None);
    }
    let mut writer = format.record_writer(ctx)?;

    match writer.mode() {
        Mode::Single => {
            for record in records {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                writer.write(None, record)?;
            }
            let written = match (writer.store_name(), writer.metrics()) {
                (Some(store), Some(metrics)) => vec![(store.to_string(), metrics.write_count())],
                _ => Vec::new(),
            };
            writer.close(ctx)?;
            Ok(Some(written))
        }
        Mode::Multi => {
            writer.close(ctx)?;
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let mut session = format.open_session(ctx)?;
            for record in records {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                session.write_all(record)?;
            }
            let snapshots = session.close()?;
            Ok(Some(
                snapshots
                    .into_iter()
                    .map(|(store, snapshot)| (store, snapshot.write_count))
                    .collect(),
            ))
        }
    }
}

fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Datum, FuncSpec, JobSettings, PlanVersion, StoreDescriptor, StoreRole};
    use std::fs;
    use std::path::Path;

    fn plan(out: &Path, stores: &[(&str, &str)], tasks: u32) -> JobPlan {
        JobPlan {
            version: PlanVersion::V1,
            job: JobSettings {
                name: "wc".into(),
                tasks,
                speculative_attempts: 1,
                properties: Default::default(),
            },
            stores: stores
                .iter()
                .map(|(name, kind)| {
                    StoreDescriptor::new(
                        *name,
                        FuncSpec::new(*kind),
                        out.join(name).display().to_string(),
                        StoreRole::Map,
                    )
                })
                .collect(),
        }
    }

    fn runner(plan: JobPlan, input: PathBuf, attempts: u32) -> JobRunner {
        runner_with_timeout(plan, input, attempts, None)
    }

    fn runner_with_timeout(
        plan: JobPlan,
        input: PathBuf,
        attempts: u32,
        timeout: Option<Duration>,
    ) -> JobRunner {
        let config = JobConfig {
            plan,
            job_id: JobId::new("job_test"),
            input,
            delimiter: '\t',
            attempts,
            timeout,
        };
        JobRunner::new(config, stores::builtin_catalog().unwrap()).unwrap()
    }

    fn read_parts(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_partition_lines_round_robin() {
        let parts = partition_lines("a\nb\n\nc\nd\ne\n", '\t', 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[1][0].get(0), Some(&Datum::CharArray("b".into())));
    }

    #[tokio::test]
    async fn test_single_store_speculative_job() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "apple\t1\nbanana\t2\ncherry\t3\n").unwrap();
        let out = dir.path().join("out");

        let runner = runner(plan(&out, &[("words", "text")], 2), input, 3);
        let stats = runner.run().await.unwrap();

        assert_eq!(stats.records_read, 3);
        assert_eq!(stats.metrics.tasks_committed, 2);
        assert_eq!(stats.metrics.attempts_aborted, 4);
        assert_eq!(stats.metrics.records_written.get("words"), Some(&3));

        let words = out.join("words");
        assert_eq!(
            read_parts(&words),
            vec!["_SUCCESS", "part-m-00000", "part-m-00001"]
        );
        let first = fs::read_to_string(words.join("part-m-00000")).unwrap();
        assert_eq!(first, "apple\t1\ncherry\t3\n");
    }

    #[tokio::test]
    async fn test_multi_store_job_commits_every_store() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "apple\t1\nbanana\t2\n").unwrap();
        let out = dir.path().join("out");

        let runner = runner(
            plan(&out, &[("words", "text"), ("rows", "json")], 1),
            input,
            2,
        );
        let stats = runner.run().await.unwrap();

        assert_eq!(stats.metrics.tasks_committed, 1);
        assert_eq!(stats.metrics.records_written.get("rows"), Some(&2));
        for store in ["words", "rows"] {
            assert_eq!(
                read_parts(&out.join(store)),
                vec!["_SUCCESS", "part-m-00000"]
            );
        }
        let rows = fs::read_to_string(out.join("rows").join("part-m-00000")).unwrap();
        assert_eq!(rows.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_existing_output_fails_before_setup() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "a\n").unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("words")).unwrap();

        let runner = runner(plan(&out, &[("words", "text")], 1), input, 1);
        let err = runner.run().await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Output(OutputError::Validation { .. })
        ));
        assert!(!out.join("words").join("_temporary").exists());
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_setup() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let runner = runner(
            plan(&out, &[("words", "text")], 1),
            dir.path().join("missing.txt"),
            1,
        );
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, CliError::FileNotFound { .. }));
        assert!(!out.join("words").exists());
    }

    fn many_records(dir: &Path, count: usize) -> PathBuf {
        let input = dir.join("input.txt");
        let lines: String = (0..count).map(|i| format!("word{i}\t{i}\n")).collect();
        fs::write(&input, lines).unwrap();
        input
    }

    /// A job that runs out of time drains its attempts and leaves no staging behind
    #[tokio::test]
    async fn test_timeout_leaves_no_staging() {
        let dir = tempfile::tempdir().unwrap();
        let input = many_records(dir.path(), 20_000);
        let out = dir.path().join("out");

        let runner = runner_with_timeout(
            plan(&out, &[("words", "text"), ("rows", "json")], 4),
            input,
            3,
            Some(Duration::ZERO),
        );
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, CliError::Timeout { secs: 0 }), "{err:?}");

        for store in ["words", "rows"] {
            assert!(!out.join(store).join("_temporary").exists(), "{store}");
            assert!(!out.join(store).join("_SUCCESS").exists(), "{store}");
        }
    }

    #[tokio::test]
    async fn test_cancelled_job_is_interrupted_and_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let input = many_records(dir.path(), 100);
        let out = dir.path().join("out");

        let runner = runner(plan(&out, &[("words", "text")], 2), input, 2);
        runner.cancel();
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, CliError::Interrupted), "{err:?}");

        let words = out.join("words");
        assert!(!words.join("_temporary").exists());
        assert!(!words.join("_SUCCESS").exists());
        assert!(!words.join("part-m-00000").exists());
    }

    #[test]
    fn test_cancelled_attempt_aborts_its_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let runner = runner(plan(&out, &[("words", "text")], 1), dir.path().join("in"), 1);
        CommitCoordinator::for_job(runner.job(), TaskKind::JobSetup, runner.format.catalog())
            .unwrap()
            .setup_job()
            .unwrap();

        let cancel = Cancellation::default();
        cancel.cancel();
        let ctx = TaskAttemptContext::for_job(runner.job(), TaskId::map(0), 0);
        let records = vec![Tuple::parse_line("a\t1", '\t')];

        assert!(run_attempt(&runner.format, ctx, &records, &cancel)
            .unwrap()
            .is_none());
        let staging = out.join("words").join("_temporary");
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }
}
