//! TextStore - delimited text lines

use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    ConfigScope, ContractError, FuncSpec, OutputMechanism, RecordWriter, StoreFunc,
    StoreFuncFactory, Tuple,
};

use crate::file::{bind_output_dir, FileOutput};

pub const TEXT_KIND: &str = "text";

const DEFAULT_DELIMITER: char = '\t';

/// Writes each tuple as one line, fields joined by a single-character delimiter
pub struct TextStore {
    delimiter: char,
    output: Arc<FileOutput>,
}

impl TextStore {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            output: FileOutput::new(TEXT_KIND),
        }
    }

    /// Create from func params (`delimiter`, default tab)
    pub fn from_spec(spec: &FuncSpec) -> Result<Self, ContractError> {
        let delimiter = match spec.param("delimiter") {
            None => DEFAULT_DELIMITER,
            Some("\\t") => '\t',
            Some(raw) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c != '\n' => c,
                    _ => {
                        return Err(ContractError::invalid_param(
                            TEXT_KIND,
                            "delimiter",
                            format!("expected a single character, got {raw:?}"),
                        ))
                    }
                }
            }
        };
        Ok(Self::new(delimiter))
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    fn format(&self, tuple: &Tuple) -> String {
        let mut line = String::new();
        for (i, datum) in tuple.iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            line.push_str(&datum.to_string());
        }
        line
    }
}

impl StoreFunc for TextStore {
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
        writer.write(None, Bytes::from(self.format(tuple)))
    }
}

#[derive(Debug, Default)]
pub struct TextStoreFactory;

impl StoreFuncFactory for TextStoreFactory {
    fn kind(&self) -> &str {
        TEXT_KIND
    }

    fn create(&self, spec: &FuncSpec) -> Result<Box<dyn StoreFunc>, ContractError> {
        Ok(Box::new(TextStore::from_spec(spec)?))
    }
}
