use super::params::TaskParams;
use super::task::{Task, TaskSpec};
use super::tasks::{
    FitSimData, InitRawData, InitRawValidationData, InitValidationData, Simulation, VariantSimData,
};
use crate::error::ConfigurationError;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type TaskConstructor = fn(TaskParams) -> Result<Arc<dyn Task>, ConfigurationError>;

/// Builds tasks from their type tag and parameter map.
#[derive(Clone)]
pub struct TaskRegistry {
    constructors: BTreeMap<&'static str, TaskConstructor>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TaskRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(InitRawData::KIND, |p| Ok(Arc::new(InitRawData::from_params(p)?)));
        registry.register(InitRawValidationData::KIND, |p| {
            Ok(Arc::new(InitRawValidationData::from_params(p)?))
        });
        registry.register(InitValidationData::KIND, |p| {
            Ok(Arc::new(InitValidationData::from_params(p)?))
        });
        registry.register(FitSimData::KIND, |p| Ok(Arc::new(FitSimData::from_params(p)?)));
        registry.register(VariantSimData::KIND, |p| {
            Ok(Arc::new(VariantSimData::from_params(p)?))
        });
        registry.register(Simulation::KIND, |p| Ok(Arc::new(Simulation::from_params(p)?)));
        registry
    }

    pub fn register(&mut self, kind: &'static str, constructor: TaskConstructor) {
        self.constructors.insert(kind, constructor);
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    pub fn build(&self, spec: &TaskSpec) -> Result<Arc<dyn Task>, ConfigurationError> {
        let constructor = self.constructors.get(spec.task.as_str()).ok_or_else(|| {
            ConfigurationError::new(format!(
                "unknown task type '{}' (known: {:?})",
                spec.task,
                self.kinds()
            ))
        })?;
        constructor(spec.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_by_tag() {
        let registry = TaskRegistry::with_builtins();
        let task = registry
            .build(&TaskSpec::new(
                "init_raw_data",
                TaskParams::new().with("output", "kb/raw.bin"),
            ))
            .unwrap();
        assert_eq!(task.kind(), "init_raw_data");
        assert_eq!(registry.kinds().len(), 6);
    }

    #[test]
    fn test_unknown_tag() {
        let err = TaskRegistry::with_builtins()
            .build(&TaskSpec::new("analysis_plot", TaskParams::new()))
            .err()
            .unwrap();
        assert!(err.0.contains("analysis_plot"));
    }
}
