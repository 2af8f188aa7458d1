pub mod macros;

use progenitor_core::process::{Delta, Process, StepContext};
use progenitor_core::scheduler::Tier;
use progenitor_core::state::{
    Allocation, AllocationPolicy, BulkMolecules, CellIdentity, LocalEnvironment, Request,
    UniqueMolecules,
};
use progenitor_core::{ProcessError, Scheduler, SchedulerOptions, SimulationState};
use progenitor_data::SimData;
use progenitor_io::ArtifactStore;
use progenitor_lib::pipeline::tasks::{FitSimData, InitRawData};
use progenitor_lib::pipeline::workflow::{METRICS_DATA, RAW_DATA, SIM_DATA};
use progenitor_lib::pipeline::{Task, TaskParams};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

/// Requests a fixed amount of one bulk molecule and consumes every granted copy.
#[allow(dead_code)]
pub struct Consume {
    pub id: &'static str,
    pub molecule: &'static str,
    pub amount: u64,
}

impl Process for Consume {
    fn id(&self) -> &str {
        self.id
    }

    fn request(&self, _state: &SimulationState, _ctx: &StepContext) -> Vec<Request> {
        vec![Request::bulk(self.molecule, self.amount)]
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        _state: &SimulationState,
        _ctx: &StepContext,
        _rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let mut delta = Delta::noop();
        delta.add_bulk(self.molecule, -(allocation.bulk(self.molecule) as i64));
        Ok(delta)
    }
}

/// Converts every granted copy of `from` into a copy of `to`.
#[allow(dead_code)]
pub struct Convert {
    pub id: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    pub amount: u64,
}

impl Process for Convert {
    fn id(&self) -> &str {
        self.id
    }

    fn request(&self, _state: &SimulationState, _ctx: &StepContext) -> Vec<Request> {
        vec![Request::bulk(self.from, self.amount)]
    }

    fn evolve(
        &self,
        allocation: &Allocation,
        _state: &SimulationState,
        _ctx: &StepContext,
        _rng: &mut ChaCha8Rng,
    ) -> Result<Delta, ProcessError> {
        let granted = allocation.bulk(self.from) as i64;
        let mut delta = Delta::noop();
        delta.add_bulk(self.from, -granted);
        delta.add_bulk(self.to, granted);
        Ok(delta)
    }
}

#[allow(dead_code)]
pub fn consume(id: &'static str, molecule: &'static str, amount: u64) -> Box<dyn Process> {
    Box::new(Consume {
        id,
        molecule,
        amount,
    })
}

/// Hand-built cell states for scheduler tests.
#[allow(dead_code)]
pub struct CellBuilder {
    bulk: BulkMolecules,
    unique: Vec<(&'static str, f64)>,
    cell_id: Uuid,
}

#[allow(dead_code)]
impl CellBuilder {
    pub fn new() -> Self {
        Self {
            bulk: BulkMolecules::default(),
            unique: Vec::new(),
            cell_id: Uuid::nil(),
        }
    }

    pub fn with_bulk(mut self, id: &str, count: u64, mass_fg: f64) -> Self {
        self.bulk.insert(id, count, mass_fg);
        self
    }

    pub fn with_unique(mut self, kind: &'static str, mass_fg: f64) -> Self {
        self.unique.push((kind, mass_fg));
        self
    }

    pub fn with_cell_id(mut self, cell_id: Uuid) -> Self {
        self.cell_id = cell_id;
        self
    }

    pub fn build(self) -> SimulationState {
        let mut unique = UniqueMolecules::default();
        for (kind, mass_fg) in self.unique {
            unique.create(kind, mass_fg, 0);
        }
        SimulationState {
            identity: CellIdentity {
                cell_id: self.cell_id,
                parent_id: None,
                generation: 0,
            },
            step: 0,
            time_s: 0.0,
            bulk: self.bulk,
            unique,
            environment: LocalEnvironment::default(),
        }
    }

    pub fn scheduler(self, tiers: Vec<Tier>, policy: AllocationPolicy) -> Scheduler {
        Scheduler::new(
            tiers,
            self.build(),
            SchedulerOptions {
                policy,
                ..Default::default()
            },
        )
        .expect("valid scheduler")
    }
}

/// A store rooted in a fresh temporary directory.
#[allow(dead_code)]
pub fn temp_store() -> (tempfile::TempDir, ArtifactStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(dir.path());
    (dir, store)
}

/// Parameters of a plain, uncached fit of the standard artifacts.
#[allow(dead_code)]
pub fn fit_params() -> TaskParams {
    TaskParams::new()
        .with("cached", false)
        .with("debug", false)
        .with("input_data", RAW_DATA)
        .with("output_data", SIM_DATA)
        .with("cpus", 2)
        .with("disable_ribosome_capacity_fitting", false)
        .with("disable_rnapoly_capacity_fitting", false)
        .with("output_metrics_data", METRICS_DATA)
}

/// Writes raw data and fitted simulation data into `store`.
#[allow(dead_code)]
pub fn seed_sim_data(store: &ArtifactStore) -> SimData {
    InitRawData::from_params(TaskParams::new().with("output", RAW_DATA))
        .expect("valid params")
        .run(store)
        .expect("raw data");
    FitSimData::from_params(fit_params())
        .expect("valid params")
        .run(store)
        .expect("fit");
    store.load(SIM_DATA).expect("fitted data")
}
