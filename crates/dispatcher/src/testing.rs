//! In-memory store plugin for unit tests.
//!
//! Every call is recorded in a shared [`Recorder`] keyed by the store's bound
//! location. Failures are switched on per store through func params:
//! `fail_spec`, `fail_write`, `fail_close`, `fail_commit`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{
    ConfigScope, Configuration, ContractError, FuncSpec, JobContext, OutputCommitter,
    OutputMechanism, RecordWriter, StoreDescriptor, StoreFunc, StoreFuncFactory, StoreRole,
    TaskAttemptContext, TaskId, Tuple, MAP_STORES_KEY, REDUCE_STORES_KEY,
};

pub const MOCK_KIND: &str = "mock";
pub const MOCK_LOCATION_KEY: &str = "mock.location";

#[derive(Debug, Default)]
struct RecorderState {
    records: Vec<(String, String)>,
    events: Vec<String>,
    spec_checks: Vec<(String, Configuration)>,
}

#[derive(Debug, Default)]
pub struct Recorder {
    state: Mutex<RecorderState>,
}

impl Recorder {
    fn event(&self, op: &str, location: &str) {
        self.state
            .lock()
            .unwrap()
            .events
            .push(format!("{op}:{location}"));
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    /// Number of recorded `op` events across all stores
    pub fn count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.split(':').next() == Some(op))
            .count()
    }

    pub fn records_for(&self, location: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(l, _)| l == location)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Configurations seen by spec checks, in call order
    pub fn spec_checks(&self) -> Vec<(String, Configuration)> {
        self.state.lock().unwrap().spec_checks.clone()
    }
}

fn flag(params: &BTreeMap<String, String>, name: &str) -> bool {
    params.get(name).map(String::as_str) == Some("true")
}

fn bound_location(conf: &Configuration) -> Result<String, ContractError> {
    conf.get(MOCK_LOCATION_KEY)
        .map(str::to_string)
        .ok_or_else(|| ContractError::missing_config(MOCK_LOCATION_KEY))
}

pub struct MockFactory {
    recorder: Arc<Recorder>,
}

impl MockFactory {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}

impl StoreFuncFactory for MockFactory {
    fn kind(&self) -> &str {
        MOCK_KIND
    }

    fn create(&self, spec: &FuncSpec) -> Result<Box<dyn StoreFunc>, ContractError> {
        Ok(Box::new(MockFunc::new(
            Arc::clone(&self.recorder),
            spec.params.clone(),
        )))
    }
}

pub struct MockFunc {
    mechanism: Arc<MockMechanism>,
}

impl MockFunc {
    pub fn new(recorder: Arc<Recorder>, params: BTreeMap<String, String>) -> Self {
        Self {
            mechanism: Arc::new(MockMechanism { recorder, params }),
        }
    }
}

impl StoreFunc for MockFunc {
    fn output_mechanism(&self) -> Arc<dyn OutputMechanism> {
        self.mechanism.clone()
    }

    fn set_store_location(
        &mut self,
        location: &str,
        scope: &mut ConfigScope<'_>,
    ) -> Result<(), ContractError> {
        scope.set(MOCK_LOCATION_KEY, location);
        scope.set(format!("mock.bound.{location}"), "true");
        Ok(())
    }

    fn put_next(
        &mut self,
        tuple: &Tuple,
        writer: &mut dyn RecordWriter,
    ) -> Result<(), ContractError> {
        let line = tuple
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\t");
        writer.write(None, Bytes::from(line))
    }
}

struct MockMechanism {
    recorder: Arc<Recorder>,
    params: BTreeMap<String, String>,
}

impl OutputMechanism for MockMechanism {
    fn name(&self) -> &str {
        MOCK_KIND
    }

    fn check_output_specs(&self, job: &JobContext) -> Result<(), ContractError> {
        let location = bound_location(job.conf())?;
        self.recorder
            .state
            .lock()
            .unwrap()
            .spec_checks
            .push((location.clone(), job.conf().clone()));
        if flag(&self.params, "fail_spec") {
            return Err(ContractError::output_spec(location, "rejected by mock"));
        }
        Ok(())
    }

    fn record_writer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>, ContractError> {
        let location = bound_location(ctx.conf())?;
        self.recorder.event("open", &location);
        Ok(Box::new(MockWriter {
            recorder: Arc::clone(&self.recorder),
            location,
            fail_write: flag(&self.params, "fail_write"),
            fail_close: flag(&self.params, "fail_close"),
        }))
    }

    fn output_committer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn OutputCommitter>, ContractError> {
        Ok(Box::new(MockCommitter {
            recorder: Arc::clone(&self.recorder),
            location: bound_location(ctx.conf())?,
            fail_commit: flag(&self.params, "fail_commit"),
        }))
    }
}

struct MockWriter {
    recorder: Arc<Recorder>,
    location: String,
    fail_write: bool,
    fail_close: bool,
}

impl RecordWriter for MockWriter {
    fn write(&mut self, _key: Option<Bytes>, value: Bytes) -> Result<(), ContractError> {
        if self.fail_write {
            return Err(ContractError::store_write(&self.location, "disk full"));
        }
        self.recorder.state.lock().unwrap().records.push((
            self.location.clone(),
            String::from_utf8_lossy(&value).into_owned(),
        ));
        Ok(())
    }

    fn close(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        self.recorder.event("close", &self.location);
        if self.fail_close {
            return Err(ContractError::store_write(&self.location, "close failed"));
        }
        Ok(())
    }
}

struct MockCommitter {
    recorder: Arc<Recorder>,
    location: String,
    fail_commit: bool,
}

impl OutputCommitter for MockCommitter {
    fn setup_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        self.recorder.event("setup_job", &self.location);
        Ok(())
    }

    fn commit_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        self.recorder.event("commit_job", &self.location);
        Ok(())
    }

    fn setup_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        self.recorder.event("setup_task", &self.location);
        Ok(())
    }

    fn needs_task_commit(&self, _ctx: &TaskAttemptContext) -> Result<bool, ContractError> {
        Ok(true)
    }

    fn commit_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        if self.fail_commit {
            return Err(ContractError::commit(&self.location, "rename failed"));
        }
        self.recorder.event("commit_task", &self.location);
        Ok(())
    }

    fn abort_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        self.recorder.event("abort_task", &self.location);
        Ok(())
    }
}

pub fn mock_catalog(recorder: &Arc<Recorder>) -> crate::StoreCatalog {
    let mut catalog = crate::StoreCatalog::new();
    catalog
        .register(Arc::new(MockFactory::new(Arc::clone(recorder))))
        .unwrap();
    catalog
}

pub fn mock_store(name: &str, location: &str, role: StoreRole) -> StoreDescriptor {
    StoreDescriptor::new(name, FuncSpec::new(MOCK_KIND), location, role)
}

pub fn mock_store_with(
    name: &str,
    location: &str,
    role: StoreRole,
    params: &[(&str, &str)],
) -> StoreDescriptor {
    let func = params
        .iter()
        .fold(FuncSpec::new(MOCK_KIND), |f, (k, v)| f.with_param(*k, *v));
    StoreDescriptor::new(name, func, location, role)
}

/// Job configuration with both store lists set
pub fn job_configuration(stores: &[StoreDescriptor]) -> Configuration {
    let by_role = |role: StoreRole| -> Vec<StoreDescriptor> {
        stores.iter().filter(|s| s.role == role).cloned().collect()
    };
    let mut conf = Configuration::new();
    conf.set("job.name", "unit");
    conf.set(
        MAP_STORES_KEY,
        contracts::encode_store_list(&by_role(StoreRole::Map)).unwrap(),
    );
    conf.set(
        REDUCE_STORES_KEY,
        contracts::encode_store_list(&by_role(StoreRole::Reduce)).unwrap(),
    );
    conf
}

pub fn job_context(stores: &[StoreDescriptor]) -> JobContext {
    JobContext::new("job_unit".into(), job_configuration(stores))
}

pub fn attempt_context(stores: &[StoreDescriptor]) -> TaskAttemptContext {
    TaskAttemptContext::for_job(&job_context(stores), TaskId::map(0), 0)
}
