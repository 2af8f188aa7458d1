use crate::error::{ConfigurationError, PipelineError, Result};
use crate::model::cell::CellDefinition;
use crate::pipeline::manifest::TaskManifest;
use crate::pipeline::params::TaskParams;
use crate::pipeline::task::{Task, TaskOutcome};
use progenitor_core::scheduler::StepOutcome;
use progenitor_core::state::AllocationPolicy;
use progenitor_core::RecordSink;
use progenitor_data::{CellState, DaughterPair, SimData};
use progenitor_io::{ArtifactStore, StoreError};
use std::path::PathBuf;

pub const FINAL_STATE: &str = "final_state.bin";
pub const LISTENER_RECORDS: &str = "listeners.jsonl.gz";
pub const GRANT_RECORDS: &str = "grants.jsonl.gz";
pub const DAUGHTERS: &str = "daughters.bin";

/// Simulates one cell, fresh or inherited from a divided parent.
#[derive(Debug)]
pub struct Simulation {
    params: TaskParams,
    input_sim_data: PathBuf,
    output_directory: PathBuf,
    inherited_state_path: Option<PathBuf>,
    daughter_index: u8,
    seed: u64,
    max_steps: u64,
    require_division: bool,
    cell: CellDefinition,
}

impl Simulation {
    pub const KIND: &'static str = "simulation";
    const NAME: &'static str = "SimulationTask";
    const REQUIRED: &'static [&'static str] =
        &["input_sim_data", "output_directory", "seed", "max_steps"];
    const OPTIONAL: &'static [&'static str] = &[
        "inherited_state_path",
        "daughter_index",
        "allocation_policy",
        "division_enabled",
        "mass_fold_threshold",
        "time_step_s",
        "log_every",
        "require_division",
    ];

    pub fn from_params(params: TaskParams) -> std::result::Result<Self, ConfigurationError> {
        let n = Self::NAME;
        params.check(n, Self::REQUIRED, Self::OPTIONAL)?;

        let defaults = CellDefinition::default();
        let policy = match params.opt_string(n, "allocation_policy")? {
            Some(name) => serde_json::from_value::<AllocationPolicy>(serde_json::Value::String(name.clone()))
                .map_err(|_| ConfigurationError::new(format!("{}: unknown allocation policy '{}'", n, name)))?,
            None => defaults.policy,
        };
        let division_threshold = if params.opt_boolean(n, "division_enabled", true)? {
            let threshold = params
                .opt_float(n, "mass_fold_threshold")?
                .unwrap_or(2.0);
            if threshold <= 1.0 {
                return Err(ConfigurationError::new(format!(
                    "{}: mass_fold_threshold must exceed 1.0",
                    n
                )));
            }
            Some(threshold)
        } else {
            None
        };
        let time_step_s = params.opt_float(n, "time_step_s")?;
        if matches!(time_step_s, Some(dt) if !(dt > 0.0 && dt.is_finite())) {
            return Err(ConfigurationError::new(format!("{}: time_step_s must be positive", n)));
        }

        let daughter_index = match params.opt_unsigned(n, "daughter_index")?.unwrap_or(0) {
            0 => 0,
            1 => 1,
            other => {
                return Err(ConfigurationError::new(format!(
                    "{}: daughter_index must be 0 or 1, got {}",
                    n, other
                )))
            }
        };
        let max_steps = params.unsigned(n, "max_steps")?;
        if max_steps == 0 {
            return Err(ConfigurationError::new(format!("{}: max_steps must be positive", n)));
        }

        Ok(Self {
            input_sim_data: params.path(n, "input_sim_data")?,
            output_directory: params.path(n, "output_directory")?,
            inherited_state_path: params.opt_path(n, "inherited_state_path")?,
            daughter_index,
            seed: params.unsigned(n, "seed")?,
            max_steps,
            require_division: params.opt_boolean(n, "require_division", false)?,
            cell: CellDefinition {
                policy,
                division_threshold,
                time_step_s,
                log_every: params.opt_unsigned(n, "log_every")?.unwrap_or(defaults.log_every),
                ..defaults
            },
            params,
        })
    }

    fn inherited_state(&self, store: &ArtifactStore) -> Result<Option<CellState>> {
        let Some(path) = &self.inherited_state_path else {
            return Ok(None);
        };
        let pair: DaughterPair = store.load(path)?;
        Ok(Some(if self.daughter_index == 0 {
            pair.first
        } else {
            pair.second
        }))
    }
}

fn sink_error(e: std::io::Error) -> PipelineError {
    PipelineError::Store(StoreError::from(e).with_context("publishing listener records"))
}

impl Task for Simulation {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> &TaskParams {
        &self.params
    }

    fn inputs(&self) -> Vec<PathBuf> {
        let mut inputs = vec![self.input_sim_data.clone()];
        inputs.extend(self.inherited_state_path.clone());
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        let mut outputs = vec![
            self.output_directory.join(FINAL_STATE),
            self.output_directory.join(LISTENER_RECORDS),
            self.output_directory.join(GRANT_RECORDS),
        ];
        if self.require_division {
            outputs.push(self.output_directory.join(DAUGHTERS));
        }
        outputs
    }

    fn run(&self, store: &ArtifactStore) -> Result<TaskOutcome> {
        let sim_data: SimData = store.load(&self.input_sim_data)?;
        let inherited = self.inherited_state(store)?;
        let mut scheduler = self.cell.build(&sim_data, inherited.as_ref(), self.seed)?;
        tracing::info!(
            cell = %scheduler.state().identity.cell_id,
            generation = scheduler.state().identity.generation,
            output = ?self.output_directory,
            "Simulation started"
        );

        scheduler.set_sink(Box::new(
            store.record_writer(self.output_directory.join(LISTENER_RECORDS))?,
        ));
        let mut grants = store.record_writer(self.output_directory.join(GRANT_RECORDS))?;

        let mut divided = false;
        for _ in 0..self.max_steps {
            let outcome = scheduler.step()?;
            for grant in scheduler.last_grants() {
                grants.append(grant)?;
            }
            if let StepOutcome::Divided = outcome {
                divided = true;
                break;
            }
        }
        if self.require_division && !divided {
            return Err(PipelineError::task_failed(
                Self::NAME,
                format!("cell did not divide within {} steps", self.max_steps),
            ));
        }

        if let Some(sink) = scheduler.take_sink() {
            sink.close().map_err(sink_error)?;
        }
        grants.finish()?;
        let final_state = scheduler.state().snapshot();
        store.save(self.output_directory.join(FINAL_STATE), &final_state)?;
        if let Some((first, second)) = scheduler.take_daughters() {
            store.save(
                self.output_directory.join(DAUGHTERS),
                &DaughterPair {
                    first: first.snapshot(),
                    second: second.snapshot(),
                },
            )?;
        }
        tracing::info!(
            steps = final_state.step,
            time_s = final_state.time_s,
            divided,
            "Simulation finished"
        );
        Ok(TaskOutcome::Completed)
    }

    fn describe(&self) -> TaskManifest {
        let value = |key: &str| self.params.get(key).cloned();
        TaskManifest::new(
            Self::NAME,
            Self::KIND,
            "Simulates one cell until division or the step limit.",
        )
        .input(
            "input_sim_data",
            value("input_sim_data"),
            "Simulation data (possibly a variant)",
            Some("binary artifact (sim_data)"),
        )
        .input(
            "inherited_state_path",
            value("inherited_state_path"),
            "Daughter states of the parent cell",
            Some("binary artifact (daughter_pair)"),
        )
        .input("daughter_index", value("daughter_index"), "Which daughter to continue", None)
        .input("seed", value("seed"), "Random seed of the lineage", None)
        .input("max_steps", value("max_steps"), "Step limit", None)
        .input("allocation_policy", value("allocation_policy"), "Over-subscription policy", None)
        .input("mass_fold_threshold", value("mass_fold_threshold"), "Division mass fold change", None)
        .output(FINAL_STATE, "State after the last step", "binary artifact (cell_state)")
        .output(LISTENER_RECORDS, "Listener rows, one per listener and step", "gzip JSON lines")
        .output(GRANT_RECORDS, "Requested versus granted resources", "gzip JSON lines")
        .output(DAUGHTERS, "Initial states of both daughters", "binary artifact (daughter_pair)")
        .methods("Tiered process scheduling with two-phase resource partitioning.")
        .categories(&["simulation"])
    }
}
