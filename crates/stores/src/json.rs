//! JsonStore - one JSON document per line
//!
//! Without a `fields` param each tuple becomes an array; with
//! `fields = "word,count"` it becomes an object keyed by those names.

use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    ConfigScope, ContractError, FuncSpec, OutputMechanism, RecordWriter, StoreFunc,
    StoreFuncFactory, Tuple,
};
use serde_json::{Map, Value};

use crate::file::{bind_output_dir, FileOutput};

pub const JSON_KIND: &str = "json";

pub struct JsonStore {
    fields: Option<Vec<String>>,
    output: Arc<FileOutput>,
}

impl JsonStore {
    pub fn new(fields: Option<Vec<String>>) -> Self {
        Self {
            fields,
            output: FileOutput::new(JSON_KIND),
        }
    }

    pub fn from_spec(spec: &FuncSpec) -> Result<Self, ContractError> {
        let fields = match spec.param("fields") {
            None => None,
            Some(raw) => {
                let names: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).collect();
                if names.iter().any(String::is_empty) {
                    return Err(ContractError::invalid_param(
                        JSON_KIND,
                        "fields",
                        "field names must be non-empty",
                    ));
                }
                Some(names)
            }
        };
        Ok(Self::new(fields))
    }

    fn encode(&self, tuple: &Tuple) -> Result<Value, ContractError> {
        let values = tuple.iter().map(|d| d.to_json());
        match &self.fields {
            None => Ok(Value::Array(values.collect())),
            Some(names) if names.len() == tuple.len() => Ok(Value::Object(
                names.iter().cloned().zip(values).collect::<Map<_, _>>(),
            )),
            Some(names) => Err(ContractError::store_write(
                JSON_KIND,
                format!("tuple has {} fields, schema has {}", tuple.len(), names.len()),
            )),
        }
    }
}

impl StoreFunc for JsonStore {
    fn output_mechanism(&self) -> Arc<dyn OutputMechanism> {
        self.output.clone()
    }

    fn set_store_location(
        &mut self,
        location: &str,
        scope: &mut ConfigScope<'_>,
    ) -> Result<(), ContractError> {
        bind_output_dir(location, scope)
    }

    fn put_next(
        &mut self,
        tuple: &Tuple,
        writer: &mut dyn RecordWriter,
    ) -> Result<(), ContractError> {
        let line = serde_json::to_vec(&self.encode(tuple)?)
            .map_err(|e| ContractError::store_write(JSON_KIND, e.to_string()))?;
        writer.write(None, Bytes::from(line))
    }
}

#[derive(Debug, Default)]
pub struct JsonStoreFactory;

impl StoreFuncFactory for JsonStoreFactory {
    fn kind(&self) -> &str {
        JSON_KIND
    }

    fn create(&self, spec: &FuncSpec) -> Result<Box<dyn StoreFunc>, ContractError> {
        Ok(Box::new(JsonStore::from_spec(spec)?))
    }
}
