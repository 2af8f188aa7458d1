//! The standard workflow: raw data, optional validation data, fit, one
//! variant task per index and a lineage of simulations per seed.
//!
//! Output layout under the store root:
//!
//! ```text
//! kb/raw_data.bin
//! kb/sim_data.bin
//! kb/metrics_data.bin
//! <variant>_<index>/kb/sim_data.bin
//! <variant>_<index>/metadata/{short_name,description}
//! <variant>_<index>/<seed>/generation_<g>/000000/simOut/...
//! ```

use super::orchestrator::{Orchestrator, OrchestratorOptions};
use super::params::TaskParams;
use super::runner::TaskRunner;
use super::task::TaskSpec;
use super::tasks::{
    FitSimData, InitRawData, InitRawValidationData, InitValidationData, Simulation, VariantSimData,
    DAUGHTERS,
};
use crate::error::ConfigurationError;
use progenitor_core::AppConfig;
use progenitor_data::Variant;
use progenitor_io::ArtifactStore;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RAW_DATA: &str = "kb/raw_data.bin";
pub const RAW_VALIDATION_DATA: &str = "kb/raw_validation_data.bin";
pub const VALIDATION_DATA: &str = "kb/validation_data.bin";
pub const SIM_DATA: &str = "kb/sim_data.bin";
pub const METRICS_DATA: &str = "kb/metrics_data.bin";
pub const INTERMEDIATES: &str = "kb/intermediates";

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// Output directory of one simulated cell.
#[must_use]
pub fn cell_directory(variant: &Variant, seed: u32, generation: u32) -> PathBuf {
    PathBuf::from(variant.label())
        .join(format!("{:06}", seed))
        .join(format!("generation_{:06}", generation))
        .join(format!("{:06}", 0))
        .join("simOut")
}

/// Labelled task specs of the standard workflow, in dependency order.
#[must_use]
pub fn standard_workflow(config: &AppConfig) -> Vec<(String, TaskSpec)> {
    let pipeline = &config.pipeline;
    let mut specs = vec![(
        "init_raw_data".to_string(),
        TaskSpec::new(InitRawData::KIND, TaskParams::new().with("output", RAW_DATA)),
    )];

    if pipeline.run_validation {
        specs.push((
            "init_raw_validation_data".to_string(),
            TaskSpec::new(
                InitRawValidationData::KIND,
                TaskParams::new().with("output", RAW_VALIDATION_DATA),
            ),
        ));
        specs.push((
            "init_validation_data".to_string(),
            TaskSpec::new(
                InitValidationData::KIND,
                TaskParams::new()
                    .with("validation_data_input", RAW_VALIDATION_DATA)
                    .with("knowledge_base_raw", RAW_DATA)
                    .with("output_data", VALIDATION_DATA),
            ),
        ));
    }

    let mut fit = TaskParams::new()
        .with("cached", pipeline.cached)
        .with("debug", pipeline.debug_fit)
        .with("input_data", RAW_DATA)
        .with("output_data", SIM_DATA)
        .with("cpus", pipeline.cpus as u64)
        .with("disable_ribosome_capacity_fitting", false)
        .with("disable_rnapoly_capacity_fitting", false)
        .with("output_metrics_data", METRICS_DATA);
    if let Some(cached_data) = &pipeline.cached_data {
        fit.insert("cached_data", path_value(cached_data));
    }
    if pipeline.save_intermediates {
        fit.insert("save_intermediates", true);
        fit.insert("intermediates_directory", INTERMEDIATES);
    }
    specs.push(("fit_sim_data".to_string(), TaskSpec::new(FitSimData::KIND, fit)));

    for index in pipeline.first_variant_index..=pipeline.last_variant_index {
        let variant = Variant::new(&pipeline.variant_function, index);
        let label = variant.label();
        let variant_sim_data = PathBuf::from(&label).join(SIM_DATA);
        specs.push((
            format!("variant_{}", label),
            TaskSpec::new(
                VariantSimData::KIND,
                TaskParams::new()
                    .with("variant_function", pipeline.variant_function.as_str())
                    .with("variant_index", index)
                    .with("input_sim_data", SIM_DATA)
                    .with("output_sim_data", path_value(&variant_sim_data))
                    .with("variant_metadata_directory", path_value(&PathBuf::from(&label).join("metadata"))),
            ),
        ));

        for seed in 0..pipeline.seeds {
            for generation in 0..pipeline.generations {
                let dir = cell_directory(&variant, seed, generation);
                let mut params = TaskParams::new()
                    .with("input_sim_data", path_value(&variant_sim_data))
                    .with("output_directory", path_value(&dir))
                    .with("seed", config.simulation.seed.wrapping_add(u64::from(seed)))
                    .with("max_steps", config.simulation.max_steps)
                    .with("log_every", config.simulation.log_every)
                    .with("division_enabled", config.division.enabled)
                    .with("mass_fold_threshold", config.division.mass_fold_threshold)
                    .with(
                        "allocation_policy",
                        serde_json::to_value(config.allocation.policy).unwrap_or(Value::Null),
                    )
                    .with("require_division", generation + 1 < pipeline.generations);
                if let Some(dt) = config.simulation.time_step_s {
                    params.insert("time_step_s", dt);
                }
                if generation > 0 {
                    let parent = cell_directory(&variant, seed, generation - 1).join(DAUGHTERS);
                    params.insert("inherited_state_path", path_value(&parent));
                    params.insert("daughter_index", 0);
                }
                specs.push((
                    format!("sim_{}_{:06}_gen_{:06}", label, seed, generation),
                    TaskSpec::new(Simulation::KIND, params),
                ));
            }
        }
    }
    specs
}

/// An orchestrator loaded with the standard workflow.
pub fn build_orchestrator(
    config: &AppConfig,
    store: ArtifactStore,
    runner: Arc<dyn TaskRunner>,
) -> Result<Orchestrator, ConfigurationError> {
    let mut orchestrator = Orchestrator::new(store, runner, OrchestratorOptions::from_config(&config.pipeline));
    for (label, spec) in standard_workflow(config) {
        orchestrator.add(&label, spec)?;
    }
    Ok(orchestrator)
}
