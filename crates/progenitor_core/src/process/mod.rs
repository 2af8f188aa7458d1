//! Process units: the pluggable steps that consume and produce state.
//!
//! A unit is stateless between steps. Each tier pass it
//! 1. files [`Request`]s against the tier-start state, then
//! 2. receives the [`Allocation`] it was granted and returns a [`Delta`].
//!
//! Units never see each other's grants and never mutate shared state; the
//! scheduler applies their deltas in a fixed order after all of them have
//! finished.

pub mod builtin;
pub mod registry;

pub use registry::{ProcessConstructor, ProcessRegistry};

use crate::error::ProcessError;
use crate::state::{Allocation, Request, SimulationState};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only information about the step being executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    pub step: u64,
    pub time_s: f64,
    pub dt: f64,
    pub tier: usize,
}

/// A unique object a unit wants created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObject {
    pub kind: String,
    pub mass_fg: f64,
}

/// Changes returned by one unit for one tier pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub bulk: BTreeMap<String, i64>,
    pub environment: BTreeMap<String, i64>,
    pub created: Vec<NewObject>,
    pub destroyed: Vec<u64>,
}

impl Delta {
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn add_bulk(&mut self, id: &str, amount: i64) {
        if amount != 0 {
            *self.bulk.entry(id.to_string()).or_insert(0) += amount;
        }
    }

    pub fn add_environment(&mut self, id: &str, amount: i64) {
        if amount != 0 {
            *self.environment.entry(id.to_string()).or_insert(0) += amount;
        }
    }

    pub fn create(&mut self, kind: &str, mass_fg: f64) {
        self.created.push(NewObject {
            kind: kind.to_string(),
            mass_fg,
        });
    }

    pub fn destroy(&mut self, id: u64) {
        self.destroyed.push(id);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bulk.values().all(|&v| v == 0)
            && self.environment.values().all(|&v| v == 0)
            && self.created.is_empty()
            && self.destroyed.is_empty()
    }

    /// Checks that every consumption stays within the grant.
    ///
    /// Production is unrestricted; removing counts or destroying objects
    /// requires a matching grant.
    pub fn check_within(&self, allocation: &Allocation, state: &SimulationState) -> Result<(), ProcessError> {
        for (id, &change) in &self.bulk {
            let used = change.min(0).unsigned_abs();
            let granted = allocation.bulk(id);
            if used > granted {
                return Err(ProcessError::ExceedsGrant {
                    resource: format!("bulk:{}", id),
                    used,
                    granted,
                });
            }
        }
        for (id, &change) in &self.environment {
            let used = change.min(0).unsigned_abs();
            let granted = allocation.environment(id);
            if used > granted {
                return Err(ProcessError::ExceedsGrant {
                    resource: format!("environment:{}", id),
                    used,
                    granted,
                });
            }
        }
        let mut seen = BTreeSet::new();
        for &id in &self.destroyed {
            let object = state.unique.get(id).ok_or(ProcessError::UnknownObject(id))?;
            let granted = allocation.unique(&object.kind);
            if !granted.contains(&id) || !seen.insert(id) {
                return Err(ProcessError::ExceedsGrant {
                    resource: format!("unique:{}#{}", object.kind, id),
                    used: 1,
                    granted: 0,
                });
            }
        }
        Ok(())
    }
}

/// A polymorphic simulation step.
pub trait Process: Send + Sync {
    /// Unique name within a cell definition.
    fn id(&self) -> &str;

    /// Demands for the coming tier pass. Must be a pure function of its inputs.
    fn request(&self, state: &SimulationState, ctx: &StepContext) -> Vec<Request>;

    /// Turns the grant into a state change.
    ///
    /// `state` is the tier-start view the requests were computed from.
    fn evolve(
        &self,
        allocation: &Allocation,
        state: &SimulationState,
        ctx: &StepContext,
        rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError>;
}

/// Rounds `x` up with probability equal to its fractional part.
pub fn stochastic_round(x: f64, rng: &mut ChaCha8Rng) -> u64 {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    let floor = x.floor();
    let frac = x - floor;
    let base = floor as u64;
    if frac > 0.0 && rng.gen::<f64>() < frac {
        base + 1
    } else {
        base
    }
}

/// Probability that a first-order event with `rate_per_s` fires within `dt`.
#[must_use]
pub fn event_probability(rate_per_s: f64, dt: f64) -> f64 {
    if rate_per_s <= 0.0 || dt <= 0.0 {
        0.0
    } else {
        1.0 - (-rate_per_s * dt).exp()
    }
}
