//! Terraform output entries and their values

use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A single JSON scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// Value of an output: a scalar, a list or a map
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Scalar(Scalar),
    Sequence(Vec<OutputValue>),
    Mapping(BTreeMap<String, OutputValue>),
}

impl OutputValue {
    /// Text placed after `=` in an env line
    ///
    /// Strings are written verbatim, numbers and booleans as their JSON
    /// literal, null as nothing, and lists and maps as compact JSON.
    pub fn render(&self) -> String {
        match self {
            OutputValue::Scalar(Scalar::Null) => String::new(),
            OutputValue::Scalar(Scalar::Bool(b)) => b.to_string(),
            OutputValue::Scalar(Scalar::Number(n)) => n.to_string(),
            OutputValue::Scalar(Scalar::String(s)) => s.clone(),
            composite => composite.to_json().to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            OutputValue::Scalar(Scalar::Null) => Value::Null,
            OutputValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            OutputValue::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            OutputValue::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            OutputValue::Sequence(items) => {
                Value::Array(items.iter().map(OutputValue::to_json).collect())
            }
            OutputValue::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

impl From<Value> for OutputValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => OutputValue::Scalar(Scalar::Null),
            Value::Bool(b) => OutputValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => OutputValue::Scalar(Scalar::Number(n)),
            Value::String(s) => OutputValue::Scalar(Scalar::String(s)),
            Value::Array(items) => {
                OutputValue::Sequence(items.into_iter().map(OutputValue::from).collect())
            }
            Value::Object(entries) => OutputValue::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, OutputValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// One record of `terraform output -json`
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEntry {
    pub key: String,
    pub sensitive: bool,
    /// Informational only
    pub declared_type: String,
    pub value: OutputValue,
}

/// Wire shape of an output record
#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    sensitive: bool,
    #[serde(rename = "type", default)]
    declared_type: Value,
    #[serde(default)]
    value: Value,
}

impl OutputEntry {
    fn from_raw(key: String, raw: RawOutput) -> Self {
        // Complex types arrive as type expressions such as ["list","string"].
        let declared_type = match raw.declared_type {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Self {
            key,
            sensitive: raw.sensitive,
            declared_type,
            value: raw.value.into(),
        }
    }
}

/// Outputs keyed by name, iterated in name order
pub type OutputMap = BTreeMap<String, OutputEntry>;

/// Parse the output document
pub fn parse_outputs(raw: &[u8]) -> Result<OutputMap, serde_json::Error> {
    let records: BTreeMap<String, RawOutput> = serde_json::from_slice(raw)?;

    Ok(records
        .into_iter()
        .map(|(key, record)| (key.clone(), OutputEntry::from_raw(key, record)))
        .collect())
}
