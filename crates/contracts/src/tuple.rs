//! Tuple / Datum - records emitted by a task

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datum {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    CharArray(String),
    ByteArray(Bytes),
}

impl Datum {
    /// Infer a typed datum from raw text: integers, then floats, then text.
    /// Empty input becomes `Null`.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Datum::Null;
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Datum::Long(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return Datum::Double(v);
        }
        match raw {
            "true" => Datum::Boolean(true),
            "false" => Datum::Boolean(false),
            _ => Datum::CharArray(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// JSON representation used by structured stores
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Datum::Null => serde_json::Value::Null,
            Datum::Boolean(b) => serde_json::Value::Bool(*b),
            Datum::Long(v) => serde_json::Value::from(*v),
            Datum::Double(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Datum::CharArray(s) => serde_json::Value::String(s.clone()),
            Datum::ByteArray(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Text form; `Null` renders as the empty string
impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => Ok(()),
            Datum::Boolean(b) => write!(f, "{b}"),
            Datum::Long(v) => write!(f, "{v}"),
            Datum::Double(v) => write!(f, "{v}"),
            Datum::CharArray(s) => f.write_str(s),
            Datum::ByteArray(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Ordered list of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuple(Vec<Datum>);

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<Datum>) -> Self {
        Self(fields)
    }

    /// Split a text line on `delimiter`, inferring each field's type
    pub fn parse_line(line: &str, delimiter: char) -> Self {
        Self(line.split(delimiter).map(Datum::infer).collect())
    }

    pub fn push(&mut self, datum: Datum) {
        self.0.push(datum);
    }

    pub fn get(&self, idx: usize) -> Option<&Datum> {
        self.0.get(idx)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[Datum] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datum> {
        self.0.iter()
    }
}

impl From<Vec<Datum>> for Tuple {
    fn from(fields: Vec<Datum>) -> Self {
        Self(fields)
    }
}
