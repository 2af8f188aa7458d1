//! String-keyed task parameters.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Parameters handed to a task constructor.
///
/// Typed getters fail with a [`ConfigurationError`] naming the task and key,
/// so a bad parameter map is rejected before a task touches any artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskParams(BTreeMap<String, Value>);

impl TaskParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Checks that every `required` key is present and warns about keys
    /// that are neither required nor optional.
    pub fn check(&self, task: &str, required: &[&str], optional: &[&str]) -> Result<(), ConfigurationError> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|k| !self.0.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::new(format!(
                "{} is missing required parameter(s): {}",
                task,
                missing.join(", ")
            )));
        }
        for key in self.keys() {
            if !required.contains(&key) && !optional.contains(&key) {
                tracing::warn!(task, key, "Ignoring unknown task parameter");
            }
        }
        Ok(())
    }

    fn required(&self, task: &str, key: &str) -> Result<&Value, ConfigurationError> {
        self.0
            .get(key)
            .ok_or_else(|| ConfigurationError::new(format!("{} requires '{}'", task, key)))
    }

    fn mistyped(task: &str, key: &str, expected: &str, found: &Value) -> ConfigurationError {
        ConfigurationError::new(format!(
            "{}: '{}' must be {}, got {}",
            task, key, expected, found
        ))
    }

    pub fn string(&self, task: &str, key: &str) -> Result<String, ConfigurationError> {
        let value = self.required(task, key)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::mistyped(task, key, "a string", value))
    }

    pub fn path(&self, task: &str, key: &str) -> Result<PathBuf, ConfigurationError> {
        self.string(task, key).map(PathBuf::from)
    }

    pub fn boolean(&self, task: &str, key: &str) -> Result<bool, ConfigurationError> {
        let value = self.required(task, key)?;
        value
            .as_bool()
            .ok_or_else(|| Self::mistyped(task, key, "a boolean", value))
    }

    pub fn unsigned(&self, task: &str, key: &str) -> Result<u64, ConfigurationError> {
        let value = self.required(task, key)?;
        value
            .as_u64()
            .ok_or_else(|| Self::mistyped(task, key, "a non-negative integer", value))
    }

    pub fn float(&self, task: &str, key: &str) -> Result<f64, ConfigurationError> {
        let value = self.required(task, key)?;
        value
            .as_f64()
            .ok_or_else(|| Self::mistyped(task, key, "a number", value))
    }

    pub fn opt_string(&self, task: &str, key: &str) -> Result<Option<String>, ConfigurationError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.string(task, key).map(Some),
        }
    }

    pub fn opt_path(&self, task: &str, key: &str) -> Result<Option<PathBuf>, ConfigurationError> {
        Ok(self.opt_string(task, key)?.map(PathBuf::from))
    }

    pub fn opt_boolean(&self, task: &str, key: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.boolean(task, key),
        }
    }

    pub fn opt_unsigned(&self, task: &str, key: &str) -> Result<Option<u64>, ConfigurationError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.unsigned(task, key).map(Some),
        }
    }

    pub fn opt_float(&self, task: &str, key: &str) -> Result<Option<f64>, ConfigurationError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.float(task, key).map(Some),
        }
    }
}

impl FromIterator<(String, Value)> for TaskParams {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
