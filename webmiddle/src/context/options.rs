//! Context options: a flat map merged by shallow override.

use crate::value::Value;
use indexmap::IndexMap;

pub const DEBUG: &str = "debug";
pub const EXPECT_RESOURCE: &str = "expectResource";
pub const FUNCTION_PARAMETERS: &str = "functionParameters";
pub const MAX_STEPS: &str = "maxSteps";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    entries: IndexMap<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Keys of `overrides` replace ours wholesale; nested values are not merged.
    pub fn merged(&self, overrides: &Options) -> Options {
        let mut entries = self.entries.clone();
        for (key, value) in &overrides.entries {
            entries.insert(key.clone(), value.clone());
        }
        Options { entries }
    }

    pub fn debug(&self) -> bool {
        self.get(DEBUG).map(Value::is_truthy).unwrap_or(false)
    }

    pub fn expect_resource(&self) -> bool {
        self.get(EXPECT_RESOURCE)
            .map(Value::is_truthy)
            .unwrap_or(false)
    }

    /// Positional arguments for function values; a lone non-array value is
    /// treated as a single argument.
    pub fn function_parameters(&self) -> Vec<Value> {
        match self.get(FUNCTION_PARAMETERS) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        }
    }

    pub fn max_steps(&self) -> Option<usize> {
        self.get(MAX_STEPS)
            .and_then(Value::as_i64)
            .filter(|n| *n > 0)
            .map(|n| n as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

impl FromIterator<(String, Value)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
