use crate::error::SimulationError;
use crate::process::{Process, ProcessRegistry};
use progenitor_data::SimData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One tier: an ordered group of unit names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub name: String,
    pub units: Vec<String>,
}

impl TierDefinition {
    pub fn new(name: &str, units: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            units: units.iter().map(|u| u.to_string()).collect(),
        }
    }
}

/// Ordered, immutable list of tier definitions.
///
/// Built once and shared; cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRegistry {
    tiers: Arc<[TierDefinition]>,
}

impl TierRegistry {
    /// Validates and freezes `tiers`.
    ///
    /// Every tier needs at least one unit and a unit may appear only once
    /// across all tiers.
    pub fn new(tiers: Vec<TierDefinition>) -> Result<Self, SimulationError> {
        if tiers.is_empty() {
            return Err(SimulationError::configuration("at least one tier is required"));
        }
        let mut seen = BTreeSet::new();
        for tier in &tiers {
            if tier.units.is_empty() {
                return Err(SimulationError::configuration(format!(
                    "tier '{}' has no units",
                    tier.name
                )));
            }
            for unit in &tier.units {
                if !seen.insert(unit.as_str()) {
                    return Err(SimulationError::configuration(format!(
                        "unit '{}' belongs to more than one tier",
                        unit
                    )));
                }
            }
        }
        Ok(Self {
            tiers: tiers.into(),
        })
    }

    /// Ordering of the standard cell definition.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            tiers: vec![
                TierDefinition::new("unbinding", &["tf_unbinding"]),
                TierDefinition::new("equilibrium", &["complexation"]),
                TierDefinition::new("binding", &["tf_binding"]),
                TierDefinition::new("expression", &["synthesis", "degradation"]),
                TierDefinition::new("exchange", &["metabolism"]),
            ]
            .into(),
        }
    }

    #[must_use]
    pub fn tiers(&self) -> &[TierDefinition] {
        &self.tiers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[must_use]
    pub fn tier_of(&self, unit: &str) -> Option<usize> {
        self.tiers
            .iter()
            .position(|t| t.units.iter().any(|u| u == unit))
    }

    /// Builds every unit through `registry`.
    pub fn instantiate(
        &self,
        registry: &ProcessRegistry,
        sim_data: &SimData,
    ) -> Result<Vec<Tier>, SimulationError> {
        self.tiers
            .iter()
            .map(|def| {
                let units = def
                    .units
                    .iter()
                    .map(|name| registry.build(name, sim_data))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Tier {
                    name: def.name.clone(),
                    units,
                })
            })
            .collect()
    }
}

/// An instantiated tier.
pub struct Tier {
    pub name: String,
    pub units: Vec<Box<dyn Process>>,
}

impl Tier {
    pub fn new(name: &str, units: Vec<Box<dyn Process>>) -> Self {
        Self {
            name: name.to_string(),
            units,
        }
    }
}
