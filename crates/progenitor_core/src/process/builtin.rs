//! Process units of the standard cell definition.
//!
//! The kinetics are deliberately coarse: first-order decay, zero-order
//! synthesis scaled by `x`, fixed-rate reactions and nutrient import. What
//! matters is that every unit respects the partitioning contract.

use super::{event_probability, stochastic_round, Delta, Process, StepContext};
use crate::error::ProcessError;
use crate::state::{Allocation, Request, SimulationState, StateManager};
use progenitor_data::{BindingParams, MediaComponent, MoleculeParams, ReactionParams, SimData};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Bound factors let go of their sites and return to the free pool.
pub struct TfUnbinding {
    bindings: Vec<BindingParams>,
}

impl TfUnbinding {
    pub const ID: &'static str = "tf_unbinding";

    #[must_use]
    pub fn new(sim_data: &SimData) -> Self {
        Self {
            bindings: sim_data.bindings.clone(),
        }
    }
}

impl Process for TfUnbinding {
    fn id(&self) -> &str {
        Self::ID
    }

    fn request(&self, state: &SimulationState, _ctx: &StepContext) -> Vec<Request> {
        self.bindings
            .iter()
            .map(|b| Request::unique(&b.bound_kind, state.unique.count(&b.bound_kind) as u64))
            .filter(|r| r.amount > 0)
            .collect()
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        _state: &SimulationState,
        ctx: &StepContext,
        rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let mut delta = Delta::noop();
        for binding in &self.bindings {
            let p = event_probability(binding.unbinding_rate_per_s, ctx.dt);
            for &id in allocation.unique(&binding.bound_kind) {
                if rng.gen::<f64>() < p {
                    delta.destroy(id);
                    delta.add_bulk(&binding.factor, 1);
                }
            }
        }
        Ok(delta)
    }
}

/// Fixed-rate reactions between bulk molecules.
pub struct Complexation {
    reactions: Vec<ReactionParams>,
}

impl Complexation {
    pub const ID: &'static str = "complexation";

    #[must_use]
    pub fn new(sim_data: &SimData) -> Self {
        Self {
            reactions: sim_data.reactions.clone(),
        }
    }
}

impl Process for Complexation {
    fn id(&self) -> &str {
        Self::ID
    }

    fn request(&self, _state: &SimulationState, ctx: &StepContext) -> Vec<Request> {
        let mut requests = Vec::new();
        for reaction in &self.reactions {
            let events = (reaction.rate_per_s * ctx.dt).ceil().max(0.0) as u64;
            if events == 0 {
                continue;
            }
            for term in &reaction.reactants {
                requests.push(Request::bulk(
                    &term.molecule,
                    events.saturating_mul(term.coefficient as u64),
                ));
            }
        }
        requests
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        _state: &SimulationState,
        ctx: &StepContext,
        rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let mut delta = Delta::noop();
        let mut budget: std::collections::BTreeMap<&str, u64> = std::collections::BTreeMap::new();
        for reaction in &self.reactions {
            for term in &reaction.reactants {
                budget
                    .entry(term.molecule.as_str())
                    .or_insert_with(|| allocation.bulk(&term.molecule));
            }
        }

        for reaction in &self.reactions {
            let target = stochastic_round(reaction.rate_per_s * ctx.dt, rng);
            let feasible = reaction
                .reactants
                .iter()
                .filter(|t| t.coefficient > 0)
                .map(|t| budget.get(t.molecule.as_str()).copied().unwrap_or(0) / t.coefficient as u64)
                .min()
                .unwrap_or(0);
            let events = target.min(feasible);
            if events == 0 {
                continue;
            }
            for term in &reaction.reactants {
                let used = events * term.coefficient as u64;
                if let Some(left) = budget.get_mut(term.molecule.as_str()) {
                    *left -= used;
                }
                delta.add_bulk(&term.molecule, -(used as i64));
            }
            for term in &reaction.products {
                delta.add_bulk(&term.molecule, (events * term.coefficient as u64) as i64);
            }
        }
        Ok(delta)
    }
}

/// Free factors bind to sites and become tracked unique objects.
pub struct TfBinding {
    bindings: Vec<BindingParams>,
}

impl TfBinding {
    pub const ID: &'static str = "tf_binding";

    #[must_use]
    pub fn new(sim_data: &SimData) -> Self {
        Self {
            bindings: sim_data.bindings.clone(),
        }
    }
}

impl Process for TfBinding {
    fn id(&self) -> &str {
        Self::ID
    }

    fn request(&self, state: &SimulationState, ctx: &StepContext) -> Vec<Request> {
        self.bindings
            .iter()
            .map(|b| {
                let free = state.bulk.available(&b.factor) as f64;
                let demand = (free * event_probability(b.binding_rate_per_s, ctx.dt)).ceil();
                Request::bulk(&b.factor, demand as u64)
            })
            .filter(|r| r.amount > 0)
            .collect()
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        state: &SimulationState,
        _ctx: &StepContext,
        _rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let mut delta = Delta::noop();
        for binding in &self.bindings {
            let granted = allocation.bulk(&binding.factor);
            if granted == 0 {
                continue;
            }
            let mass = state.bulk.mass_of(&binding.factor);
            for _ in 0..granted {
                delta.create(&binding.bound_kind, mass);
            }
            delta.add_bulk(&binding.factor, -(granted as i64));
        }
        Ok(delta)
    }
}

/// Zero-order synthesis from a precursor pool.
pub struct Synthesis {
    x: f64,
    molecules: Vec<MoleculeParams>,
}

impl Synthesis {
    pub const ID: &'static str = "synthesis";

    #[must_use]
    pub fn new(sim_data: &SimData) -> Self {
        Self {
            x: sim_data.x,
            molecules: sim_data
                .molecules
                .iter()
                .filter(|m| m.synthesis_rate_per_s > 0.0 && m.precursor.is_some() && m.precursor_cost > 0)
                .cloned()
                .collect(),
        }
    }

    fn target(&self, m: &MoleculeParams, dt: f64) -> f64 {
        m.synthesis_rate_per_s * self.x * dt
    }
}

impl Process for Synthesis {
    fn id(&self) -> &str {
        Self::ID
    }

    fn request(&self, _state: &SimulationState, ctx: &StepContext) -> Vec<Request> {
        self.molecules
            .iter()
            .filter_map(|m| {
                let precursor = m.precursor.as_ref()?;
                let copies = self.target(m, ctx.dt).ceil().max(0.0) as u64;
                let demand = copies.saturating_mul(m.precursor_cost as u64);
                (demand > 0).then(|| Request::bulk(precursor, demand))
            })
            .collect()
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        _state: &SimulationState,
        ctx: &StepContext,
        rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let mut delta = Delta::noop();
        let mut budget: std::collections::BTreeMap<&str, u64> = std::collections::BTreeMap::new();
        for m in &self.molecules {
            let Some(precursor) = m.precursor.as_deref() else {
                continue;
            };
            let left = *budget
                .entry(precursor)
                .or_insert_with(|| allocation.bulk(precursor));
            let wanted = stochastic_round(self.target(m, ctx.dt), rng);
            let made = wanted.min(left / m.precursor_cost as u64);
            if made == 0 {
                continue;
            }
            let cost = made * m.precursor_cost as u64;
            if let Some(left) = budget.get_mut(precursor) {
                *left -= cost;
            }
            delta.add_bulk(precursor, -(cost as i64));
            delta.add_bulk(&m.id, made as i64);
        }
        Ok(delta)
    }
}

/// First-order decay; building blocks are returned to the precursor pool.
pub struct Degradation {
    molecules: Vec<MoleculeParams>,
}

impl Degradation {
    pub const ID: &'static str = "degradation";

    #[must_use]
    pub fn new(sim_data: &SimData) -> Self {
        Self {
            molecules: sim_data
                .molecules
                .iter()
                .filter(|m| m.degradation_rate_per_s > 0.0)
                .cloned()
                .collect(),
        }
    }
}

impl Process for Degradation {
    fn id(&self) -> &str {
        Self::ID
    }

    fn request(&self, state: &SimulationState, ctx: &StepContext) -> Vec<Request> {
        self.molecules
            .iter()
            .map(|m| {
                let count = state.bulk.available(&m.id) as f64;
                let demand = (count * event_probability(m.degradation_rate_per_s, ctx.dt)).ceil();
                Request::bulk(&m.id, demand as u64)
            })
            .filter(|r| r.amount > 0)
            .collect()
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        state: &SimulationState,
        ctx: &StepContext,
        rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let mut delta = Delta::noop();
        for m in &self.molecules {
            let granted = allocation.bulk(&m.id);
            if granted == 0 {
                continue;
            }
            let expected = state.bulk.available(&m.id) as f64
                * event_probability(m.degradation_rate_per_s, ctx.dt);
            let degraded = stochastic_round(expected, rng).min(granted);
            if degraded == 0 {
                continue;
            }
            delta.add_bulk(&m.id, -(degraded as i64));
            if let Some(precursor) = &m.precursor {
                delta.add_bulk(precursor, (degraded * m.precursor_cost as u64) as i64);
            }
        }
        Ok(delta)
    }
}

/// Nutrient import from the local environment.
pub struct Metabolism {
    media: Vec<MediaComponent>,
}

impl Metabolism {
    pub const ID: &'static str = "metabolism";

    #[must_use]
    pub fn new(sim_data: &SimData) -> Self {
        Self {
            media: sim_data.media.clone(),
        }
    }
}

impl Process for Metabolism {
    fn id(&self) -> &str {
        Self::ID
    }

    fn request(&self, _state: &SimulationState, ctx: &StepContext) -> Vec<Request> {
        self.media
            .iter()
            .map(|m| {
                let demand = (m.import_rate_per_s * ctx.dt).ceil().max(0.0) as u64;
                Request::environment(&m.id, demand)
            })
            .filter(|r| r.amount > 0)
            .collect()
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        _state: &SimulationState,
        ctx: &StepContext,
        rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let mut delta = Delta::noop();
        for m in &self.media {
            let granted = allocation.environment(&m.id);
            let imported = stochastic_round(m.import_rate_per_s * ctx.dt, rng).min(granted);
            if imported == 0 {
                continue;
            }
            delta.add_environment(&m.id, -(imported as i64));
            delta.add_bulk(&m.imported_as, imported as i64);
        }
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AllocationPolicy, AllocationRound};
    use progenitor_data::{FitOptions, MoleculeClass, StoichTerm};
    use rand::SeedableRng;
    use uuid::Uuid;

    fn molecule(id: &str, count: u64) -> MoleculeParams {
        MoleculeParams {
            id: id.to_string(),
            class: MoleculeClass::Metabolite,
            mass_fg: 0.01,
            initial_count: count,
            degradation_rate_per_s: 0.0,
            synthesis_rate_per_s: 0.0,
            precursor: None,
            precursor_cost: 0,
        }
    }

    fn sim_data() -> SimData {
        let mut protein = molecule("PROT", 10);
        protein.synthesis_rate_per_s = 5.0;
        protein.degradation_rate_per_s = 0.1;
        protein.precursor = Some("AA".to_string());
        protein.precursor_cost = 2;
        SimData {
            x: 1.0,
            condition: "basal".to_string(),
            doubling_time_s: 100.0,
            time_step_s: 1.0,
            molecules: vec![molecule("AA", 100), molecule("A", 10), molecule("B", 10), molecule("AB", 0), protein],
            reactions: vec![ReactionParams {
                id: "bind_ab".to_string(),
                reactants: vec![StoichTerm::new("A", 1), StoichTerm::new("B", 1)],
                products: vec![StoichTerm::new("AB", 1)],
                rate_per_s: 3.0,
            }],
            bindings: vec![],
            media: vec![MediaComponent {
                id: "GLC[e]".to_string(),
                amount: 1000,
                imported_as: "AA".to_string(),
                import_rate_per_s: 4.0,
            }],
            fit_options: FitOptions::default(),
            completed_stages: vec![],
            applied_variants: vec![],
        }
    }

    fn run_unit(unit: &dyn Process, state: &SimulationState) -> Delta {
        let ctx = StepContext {
            step: 0,
            time_s: 0.0,
            dt: 1.0,
            tier: 0,
        };
        let mut round = AllocationRound::new(AllocationPolicy::Proportional);
        let idx = round.register(unit.id());
        for r in unit.request(state, &ctx) {
            round.request(idx, r);
        }
        let (allocations, _) = round.finalize(state);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let delta = unit.evolve(&allocations[idx], state, &ctx, &mut rng).unwrap();
        delta.check_within(&allocations[idx], state).unwrap();
        delta
    }

    #[test]
    fn test_complexation_is_mass_balanced() {
        let data = sim_data();
        let state = SimulationState::initial(&data, Uuid::nil());
        let delta = run_unit(&Complexation::new(&data), &state);
        let ab = delta.bulk.get("AB").copied().unwrap_or(0);
        assert!(ab == 3);
        assert_eq!(delta.bulk.get("A"), Some(&-ab));
        assert_eq!(delta.bulk.get("B"), Some(&-ab));
    }

    #[test]
    fn test_synthesis_consumes_precursor() {
        let data = sim_data();
        let state = SimulationState::initial(&data, Uuid::nil());
        let delta = run_unit(&Synthesis::new(&data), &state);
        let made = delta.bulk.get("PROT").copied().unwrap_or(0);
        assert_eq!(made, 5);
        assert_eq!(delta.bulk.get("AA"), Some(&-10));
    }

    #[test]
    fn test_metabolism_moves_nutrient_inside() {
        let data = sim_data();
        let state = SimulationState::initial(&data, Uuid::nil());
        let delta = run_unit(&Metabolism::new(&data), &state);
        assert_eq!(delta.environment.get("GLC[e]"), Some(&-4));
        assert_eq!(delta.bulk.get("AA"), Some(&4));
    }

    #[test]
    fn test_binding_then_unbinding_round_trip() {
        let mut data = sim_data();
        data.bindings.push(BindingParams {
            factor: "A".to_string(),
            bound_kind: "bound_A".to_string(),
            binding_rate_per_s: 100.0,
            unbinding_rate_per_s: 100.0,
        });
        let mut state = SimulationState::initial(&data, Uuid::nil());
        let delta = run_unit(&TfBinding::new(&data), &state);
        assert_eq!(delta.created.len(), 10);
        for obj in &delta.created {
            state.unique.create(&obj.kind, obj.mass_fg, 0);
        }
        let delta = run_unit(&TfUnbinding::new(&data), &state);
        assert_eq!(delta.destroyed.len(), 10);
        assert_eq!(delta.bulk.get("A"), Some(&10));
    }

    #[test]
    fn test_zero_grant_is_noop() {
        let mut data = sim_data();
        data.media[0].amount = 0;
        let state = SimulationState::initial(&data, Uuid::nil());
        let delta = run_unit(&Metabolism::new(&data), &state);
        assert!(delta.is_empty());
    }
}
