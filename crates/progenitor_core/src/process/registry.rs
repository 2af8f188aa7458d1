use super::builtin::{Complexation, Degradation, Metabolism, Synthesis, TfBinding, TfUnbinding};
use super::Process;
use crate::error::SimulationError;
use progenitor_data::SimData;
use std::collections::BTreeMap;

/// Builds a unit from the fitted parameters.
pub type ProcessConstructor = fn(&SimData) -> Box<dyn Process>;

/// Name to constructor table for process units.
///
/// Cell definitions refer to units by name only; this registry turns names
/// into instances.
#[derive(Clone)]
pub struct ProcessRegistry {
    constructors: BTreeMap<String, ProcessConstructor>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProcessRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(TfUnbinding::ID, |d| Box::new(TfUnbinding::new(d)));
        registry.register(Complexation::ID, |d| Box::new(Complexation::new(d)));
        registry.register(TfBinding::ID, |d| Box::new(TfBinding::new(d)));
        registry.register(Synthesis::ID, |d| Box::new(Synthesis::new(d)));
        registry.register(Degradation::ID, |d| Box::new(Degradation::new(d)));
        registry.register(Metabolism::ID, |d| Box::new(Metabolism::new(d)));
        registry
    }

    /// Adds or replaces a constructor.
    pub fn register(&mut self, name: &str, constructor: ProcessConstructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(&self, name: &str, sim_data: &SimData) -> Result<Box<dyn Process>, SimulationError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| SimulationError::configuration(format!("unknown process unit '{}'", name)))?;
        let unit = constructor(sim_data);
        if unit.id() != name {
            return Err(SimulationError::configuration(format!(
                "process unit registered as '{}' reports id '{}'",
                name,
                unit.id()
            )));
        }
        Ok(unit)
    }
}
