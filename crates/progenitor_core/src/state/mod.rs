//! Shared simulation state and its partitions.
//!
//! A [`SimulationState`] is split into three disjoint partitions:
//! - [`BulkMolecules`]: copy numbers of interchangeable molecules
//! - [`UniqueMolecules`]: individually tracked objects with attributes
//! - [`LocalEnvironment`]: nutrient pools of the surrounding medium
//!
//! Process units never touch these directly. They request amounts through an
//! [`AllocationRound`] and hand back a [`crate::process::Delta`] that the
//! scheduler applies.

pub mod allocation;
pub mod bulk;
pub mod environment;
pub mod unique;

pub use allocation::{partition, Allocation, AllocationPolicy, AllocationRound, GrantEntry, Request};
pub use bulk::BulkMolecules;
pub use environment::LocalEnvironment;
pub use unique::UniqueMolecules;

use progenitor_data::{CellState, SimData};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Address of a shared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKey {
    Bulk(String),
    /// Instances of one unique-object kind.
    Unique(String),
    Environment(String),
}

impl ResourceKey {
    pub fn bulk(id: impl Into<String>) -> Self {
        Self::Bulk(id.into())
    }

    pub fn unique(kind: impl Into<String>) -> Self {
        Self::Unique(kind.into())
    }

    pub fn environment(id: impl Into<String>) -> Self {
        Self::Environment(id.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Bulk(n) | Self::Unique(n) | Self::Environment(n) => n,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulk(n) => write!(f, "bulk:{}", n),
            Self::Unique(n) => write!(f, "unique:{}", n),
            Self::Environment(n) => write!(f, "environment:{}", n),
        }
    }
}

/// A count would have dropped below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeCount {
    pub name: String,
    pub current: u64,
    pub delta: i64,
}

impl fmt::Display for NegativeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} has {} copies, delta {} would go negative",
            self.name, self.current, self.delta
        )
    }
}

/// Count-based state partition.
pub trait StateManager {
    /// Partition label used in diagnostics.
    fn partition(&self) -> &'static str;

    /// Amount currently available; unknown names hold zero.
    fn available(&self, name: &str) -> u64;

    /// Adds `delta` and returns the new count.
    ///
    /// A result below zero leaves the partition untouched and reports
    /// [`NegativeCount`].
    fn apply_delta(&mut self, name: &str, delta: i64) -> Result<u64, NegativeCount>;

    /// Sum of all counts.
    fn total(&self) -> u64;
}

/// Identity of the simulated cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIdentity {
    pub cell_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub generation: u32,
}

/// Mutable, time indexed state of one cell.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub identity: CellIdentity,
    pub step: u64,
    pub time_s: f64,
    pub bulk: BulkMolecules,
    pub unique: UniqueMolecules,
    pub environment: LocalEnvironment,
}

impl SimulationState {
    /// Newborn state built from fitted initial counts and the medium.
    #[must_use]
    pub fn initial(sim_data: &SimData, cell_id: Uuid) -> Self {
        Self {
            identity: CellIdentity {
                cell_id,
                parent_id: None,
                generation: 0,
            },
            step: 0,
            time_s: 0.0,
            bulk: BulkMolecules::from_sim_data(sim_data),
            unique: UniqueMolecules::default(),
            environment: LocalEnvironment::from_media(&sim_data.media),
        }
    }

    /// Restores a persisted state; molecule masses come from `sim_data`.
    ///
    /// Counts for molecules unknown to `sim_data` are kept with zero mass.
    #[must_use]
    pub fn from_cell_state(cell: &CellState, sim_data: &SimData) -> Self {
        let mut bulk = BulkMolecules::from_sim_data(sim_data);
        bulk.zero_all();
        for entry in &cell.bulk {
            bulk.set(&entry.id, entry.count);
        }
        Self {
            identity: CellIdentity {
                cell_id: cell.cell_id,
                parent_id: cell.parent_id,
                generation: cell.generation,
            },
            step: cell.step,
            time_s: cell.time_s,
            bulk,
            unique: UniqueMolecules::from_objects(cell.unique.clone(), cell.next_unique_id),
            environment: LocalEnvironment::from_counts(&cell.environment),
        }
    }

    /// Immutable, persistable view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CellState {
        CellState {
            cell_id: self.identity.cell_id,
            parent_id: self.identity.parent_id,
            generation: self.identity.generation,
            step: self.step,
            time_s: self.time_s,
            bulk: self.bulk.snapshot(),
            unique: self.unique.snapshot(),
            environment: self.environment.snapshot(),
            next_unique_id: self.unique.next_id(),
        }
    }

    #[must_use]
    pub fn available(&self, key: &ResourceKey) -> u64 {
        match key {
            ResourceKey::Bulk(n) => self.bulk.available(n),
            ResourceKey::Unique(kind) => self.unique.count(kind) as u64,
            ResourceKey::Environment(n) => self.environment.available(n),
        }
    }

    /// Dry mass of bulk molecules plus unique objects.
    #[must_use]
    pub fn dry_mass_fg(&self) -> f64 {
        self.bulk.mass_fg() + self.unique.mass_fg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progenitor_data::{BulkCount, MediaCount, UniqueObject};

    #[test]
    fn test_resource_key_display() {
        assert_eq!(ResourceKey::bulk("ATP").to_string(), "bulk:ATP");
        assert_eq!(ResourceKey::unique("bound_tf").to_string(), "unique:bound_tf");
        assert_eq!(ResourceKey::environment("GLC").to_string(), "environment:GLC");
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let sim_data = progenitor_data::SimData {
            x: 1.0,
            condition: "basal".to_string(),
            doubling_time_s: 100.0,
            time_step_s: 1.0,
            molecules: vec![],
            reactions: vec![],
            bindings: vec![],
            media: vec![],
            fit_options: Default::default(),
            completed_stages: vec![],
            applied_variants: vec![],
        };
        let cell = CellState {
            cell_id: Uuid::nil(),
            parent_id: None,
            generation: 1,
            step: 4,
            time_s: 4.0,
            bulk: vec![BulkCount {
                id: "ATP".to_string(),
                count: 9,
            }],
            unique: vec![UniqueObject {
                id: 3,
                kind: "bound_tf".to_string(),
                mass_fg: 0.5,
                created_step: 2,
            }],
            environment: vec![MediaCount {
                id: "GLC[e]".to_string(),
                amount: 100,
            }],
            next_unique_id: 4,
        };
        let state = SimulationState::from_cell_state(&cell, &sim_data);
        assert_eq!(state.available(&ResourceKey::bulk("ATP")), 9);
        assert_eq!(state.available(&ResourceKey::unique("bound_tf")), 1);
        assert_eq!(state.snapshot(), cell);
    }
}
