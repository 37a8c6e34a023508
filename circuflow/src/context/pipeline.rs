//! The accumulating key/value state threaded through one run.

use crate::core::JsonMap;
use crate::errors::{CircuflowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Insertion-ordered, string-keyed state shared by the stages of one run.
///
/// A context starts as a copy of the run input and only ever changes by
/// [`merge`](Self::merge)-ing a successful stage's output into it. Nothing is
/// rolled back when a later stage fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineContext {
    data: JsonMap,
}

impl PipelineContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from an existing map.
    #[must_use]
    pub fn from_map(data: JsonMap) -> Self {
        Self { data }
    }

    /// Creates a context from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `value` is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(data) => Ok(Self { data }),
            other => Err(CircuflowError::config(format!(
                "run input must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Gets a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Sets a single value, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    /// Shallow-merges `data` into the context, last writer wins.
    ///
    /// Returns the keys whose previous value was replaced.
    pub fn merge(&mut self, data: &JsonMap) -> Vec<String> {
        let mut overwritten = Vec::new();
        for (key, value) in data {
            if self.data.insert(key.clone(), value.clone()).is_some() {
                overwritten.push(key.clone());
            }
        }
        overwritten
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the context holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &JsonMap {
        &self.data
    }

    /// Consumes the context, returning the underlying map.
    #[must_use]
    pub fn into_map(self) -> JsonMap {
        self.data
    }

    /// Converts the context into a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

impl From<JsonMap> for PipelineContext {
    fn from(data: JsonMap) -> Self {
        Self::from_map(data)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for PipelineContext {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
