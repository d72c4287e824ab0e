//! LogStore - logs each tuple via tracing

use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    ConfigScope, ContractError, FuncSpec, JobContext, OutputCommitter, OutputMechanism,
    RecordWriter, StoreFunc, StoreFuncFactory, TaskAttemptContext, Tuple,
};
use tracing::info;

pub const LOG_KIND: &str = "log";

const LOG_TARGET_KEY: &str = "multistore.log.target";

/// Store that logs record summaries for debugging. Nothing is staged, so
/// commit and abort are no-ops.
pub struct LogStore {
    output: Arc<LogOutput>,
}

impl LogStore {
    pub fn new() -> Self {
        Self {
            output: Arc::new(LogOutput),
        }
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreFunc for LogStore {
    fn output_mechanism(&self) -> Arc<dyn OutputMechanism> {
        self.output.clone()
    }

    fn set_store_location(
        &mut self,
        location: &str,
        scope: &mut ConfigScope<'_>,
    ) -> Result<(), ContractError> {
        scope.set(LOG_TARGET_KEY, location);
        Ok(())
    }

    fn put_next(
        &mut self,
        tuple: &Tuple,
        writer: &mut dyn RecordWriter,
    ) -> Result<(), ContractError> {
        let fields: Vec<String> = tuple.iter().map(ToString::to_string).collect();
        writer.write(None, Bytes::from(fields.join(" ")))
    }
}

#[derive(Debug)]
struct LogOutput;

impl OutputMechanism for LogOutput {
    fn name(&self) -> &str {
        LOG_KIND
    }

    fn check_output_specs(&self, _job: &JobContext) -> Result<(), ContractError> {
        Ok(())
    }

    fn record_writer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>, ContractError> {
        Ok(Box::new(LogWriter {
            target: ctx.conf().get(LOG_TARGET_KEY).unwrap_or(LOG_KIND).to_string(),
            attempt: ctx.attempt().to_string(),
            records: 0,
        }))
    }

    fn output_committer(
        &self,
        _ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn OutputCommitter>, ContractError> {
        Ok(Box::new(NoopCommitter))
    }
}

struct LogWriter {
    target: String,
    attempt: String,
    records: u64,
}

impl RecordWriter for LogWriter {
    fn write(&mut self, _key: Option<Bytes>, value: Bytes) -> Result<(), ContractError> {
        self.records += 1;
        info!(
            location = %self.target,
            attempt = %self.attempt,
            record = self.records,
            value = %String::from_utf8_lossy(&value),
            "Record received"
        );
        Ok(())
    }

    fn close(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        info!(location = %self.target, records = self.records, "LogStore closed");
        Ok(())
    }
}

struct NoopCommitter;

impl OutputCommitter for NoopCommitter {
    fn setup_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        Ok(())
    }

    fn needs_task_commit(&self, _ctx: &TaskAttemptContext) -> Result<bool, ContractError> {
        Ok(false)
    }

    fn commit_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        Ok(())
    }

    fn abort_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogStoreFactory;

impl StoreFuncFactory for LogStoreFactory {
    fn kind(&self) -> &str {
        LOG_KIND
    }

    fn create(&self, _spec: &FuncSpec) -> Result<Box<dyn StoreFunc>, ContractError> {
        Ok(Box::new(LogStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Configuration, Datum, TaskId};

    #[test]
    fn test_log_store_write() {
        let job = JobContext::new("job_log".into(), Configuration::new());
        let ctx = TaskAttemptContext::for_job(&job, TaskId::reduce(0), 0);
        let mut store = LogStore::new();
        let output = store.output_mechanism();

        let mut writer = output.record_writer(&ctx).unwrap();
        let tuple = Tuple::from_fields(vec![Datum::CharArray("hello".into())]);
        store.put_next(&tuple, writer.as_mut()).unwrap();
        writer.close(&ctx).unwrap();

        let committer = output.output_committer(&ctx).unwrap();
        assert!(!committer.needs_task_commit(&ctx).unwrap());
    }

    #[test]
    fn test_location_recorded() {
        let conf = Configuration::new();
        let mut scope = conf.scope();
        LogStore::new().set_store_location("debug", &mut scope).unwrap();
        assert_eq!(scope.get(LOG_TARGET_KEY), Some("debug"));
    }
}
