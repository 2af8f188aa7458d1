//! The standard cell: which units run in which tier, what is observed and
//! when the cell divides.

use progenitor_core::listener::{AllocationListener, MassListener, UniqueCountListener};
use progenitor_core::state::AllocationPolicy;
use progenitor_core::{
    MassDoublingDivision, Metrics, ProcessRegistry, Scheduler, SchedulerOptions, SimulationError,
    SimulationState, TierRegistry,
};
use progenitor_data::{CellState, SimData};
use std::sync::Arc;
use uuid::Uuid;

/// Namespace for deterministic cell ids of fresh lineages.
const LINEAGE_NAMESPACE: Uuid = Uuid::from_u128(0x7072_6f67_656e_6974_6f72_2d6c_696e_6561);

/// Everything needed to turn fitted data into a runnable scheduler.
#[derive(Debug, Clone)]
pub struct CellDefinition {
    pub tiers: TierRegistry,
    pub policy: AllocationPolicy,
    /// `None` disables division.
    pub division_threshold: Option<f64>,
    /// Overrides [`SimData::time_step_s`].
    pub time_step_s: Option<f64>,
    pub log_every: u64,
}

impl Default for CellDefinition {
    fn default() -> Self {
        Self {
            tiers: TierRegistry::standard(),
            policy: AllocationPolicy::default(),
            division_threshold: Some(2.0),
            time_step_s: None,
            log_every: 1000,
        }
    }
}

impl CellDefinition {
    /// Id of the founding cell of lineage `seed`.
    #[must_use]
    pub fn founder_id(seed: u64) -> Uuid {
        Uuid::new_v5(&LINEAGE_NAMESPACE, format!("seed-{}", seed).as_bytes())
    }

    /// Builds a scheduler for a fresh cell, or for a daughter when
    /// `inherited` is given.
    pub fn build(
        &self,
        sim_data: &SimData,
        inherited: Option<&CellState>,
        seed: u64,
    ) -> Result<Scheduler, SimulationError> {
        let tiers = self
            .tiers
            .instantiate(&ProcessRegistry::with_builtins(), sim_data)?;
        let state = match inherited {
            Some(cell) => SimulationState::from_cell_state(cell, sim_data),
            None => SimulationState::initial(sim_data, Self::founder_id(seed)),
        };
        let initial_mass = state.dry_mass_fg();
        let options = SchedulerOptions {
            policy: self.policy,
            seed: seed ^ state.identity.cell_id.as_u64_pair().0,
            dt: self.time_step_s.unwrap_or(sim_data.time_step_s),
        };

        let mut scheduler = Scheduler::new(tiers, state, options)?;
        scheduler.add_listener(Box::new(MassListener::with_initial_mass(initial_mass)));
        scheduler.add_listener(Box::new(AllocationListener));
        scheduler.add_listener(Box::new(UniqueCountListener));
        if let Some(threshold) = self.division_threshold {
            scheduler.set_division(Box::new(MassDoublingDivision::new(initial_mass, threshold)));
        }
        scheduler.set_metrics(Arc::new(Metrics::new(self.log_every)));
        tracing::debug!(
            cell = %scheduler.state().identity.cell_id,
            generation = scheduler.state().identity.generation,
            initial_mass_fg = initial_mass,
            dt = options.dt,
            "Cell built"
        );
        Ok(scheduler)
    }
}
