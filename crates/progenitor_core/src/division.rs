//! Terminal condition detection and state splitting.
//!
//! Splitting rules:
//! - every bulk count is halved; an odd remainder goes to the first daughter
//!   for even molecule positions and to the second for odd positions
//! - unique objects alternate between daughters by ascending instance id
//! - the environment is shared medium and both daughters inherit a copy

use crate::state::{CellIdentity, SimulationState, UniqueMolecules};
use uuid::Uuid;

/// Decides whether a state divides and, if so, how.
pub trait DivisionPolicy: Send + Sync {
    fn divide(&self, state: &SimulationState) -> Option<(SimulationState, SimulationState)>;
}

/// Divides once dry mass reaches `threshold` times the newborn mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassDoublingDivision {
    initial_mass_fg: f64,
    threshold: f64,
}

impl MassDoublingDivision {
    #[must_use]
    pub fn new(initial_mass_fg: f64, threshold: f64) -> Self {
        Self {
            initial_mass_fg,
            threshold,
        }
    }

    #[must_use]
    pub fn target_mass_fg(&self) -> f64 {
        self.initial_mass_fg * self.threshold
    }
}

impl DivisionPolicy for MassDoublingDivision {
    fn divide(&self, state: &SimulationState) -> Option<(SimulationState, SimulationState)> {
        if self.initial_mass_fg <= 0.0 || state.dry_mass_fg() < self.target_mass_fg() {
            return None;
        }
        Some(split(state))
    }
}

/// Deterministic id of daughter `index` (0 or 1) of `parent`.
#[must_use]
pub fn daughter_id(parent: Uuid, index: u8) -> Uuid {
    Uuid::new_v5(&parent, format!("daughter-{}", index).as_bytes())
}

/// Splits `state` into two daughters whose conserved totals add up to the
/// parent's.
#[must_use]
pub fn split(state: &SimulationState) -> (SimulationState, SimulationState) {
    let counts = state.bulk.counts();
    let mut first = Vec::with_capacity(counts.len());
    let mut second = Vec::with_capacity(counts.len());
    for (i, &count) in counts.iter().enumerate() {
        let half = count / 2;
        let remainder = count % 2;
        if i % 2 == 0 {
            first.push(half + remainder);
            second.push(half);
        } else {
            first.push(half);
            second.push(half + remainder);
        }
    }

    let mut unique_a = Vec::new();
    let mut unique_b = Vec::new();
    for (i, object) in state.unique.iter().enumerate() {
        if i % 2 == 0 {
            unique_a.push(object.clone());
        } else {
            unique_b.push(object.clone());
        }
    }
    let next_id = state.unique.next_id();

    let make = |index: u8, counts: Vec<u64>, objects| SimulationState {
        identity: CellIdentity {
            cell_id: daughter_id(state.identity.cell_id, index),
            parent_id: Some(state.identity.cell_id),
            generation: state.identity.generation + 1,
        },
        step: 0,
        time_s: state.time_s,
        bulk: state.bulk.with_counts(counts),
        unique: UniqueMolecules::from_objects(objects, next_id),
        environment: state.environment.clone(),
    };

    (make(0, first, unique_a), make(1, second, unique_b))
}
