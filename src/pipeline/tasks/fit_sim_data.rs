use crate::error::{ConfigurationError, PipelineError, Result};
use crate::model::fitter::{Fitter, STAGES};
use crate::pipeline::manifest::TaskManifest;
use crate::pipeline::params::TaskParams;
use crate::pipeline::task::{Task, TaskOutcome};
use chrono::{DateTime, Local};
use progenitor_data::{FitOptions, MetricsData, RawData, SimData};
use progenitor_io::ArtifactStore;
use std::path::{Path, PathBuf};

/// Result of a fit that may have been served from a cache artifact.
#[derive(Debug)]
pub enum CacheOutcome {
    Cached { modified: DateTime<Local> },
    /// Fitted from raw data; `cache_error` is set when a cache was requested
    /// but could not be used.
    Recomputed { cache_error: Option<PipelineError> },
    Failed(PipelineError),
}

/// Fits simulation parameters to the raw knowledge base.
#[derive(Debug)]
pub struct FitSimData {
    params: TaskParams,
    cached: bool,
    cached_data: Option<PathBuf>,
    input_data: PathBuf,
    output_data: PathBuf,
    output_metrics_data: PathBuf,
    cpus: usize,
    options: FitOptions,
    load_intermediate: Option<String>,
    save_intermediates: bool,
    intermediates_directory: Option<PathBuf>,
}

impl FitSimData {
    pub const KIND: &'static str = "fit_sim_data";
    const NAME: &'static str = "FitSimDataTask";
    const REQUIRED: &'static [&'static str] = &[
        "cached",
        "debug",
        "input_data",
        "output_data",
        "cpus",
        "disable_ribosome_capacity_fitting",
        "disable_rnapoly_capacity_fitting",
        "output_metrics_data",
    ];
    const OPTIONAL: &'static [&'static str] = &[
        "load_intermediate",
        "save_intermediates",
        "intermediates_directory",
        "cached_data",
        "variable_elongation_transcription",
        "variable_elongation_translation",
    ];

    pub fn from_params(params: TaskParams) -> std::result::Result<Self, ConfigurationError> {
        let n = Self::NAME;
        params.check(n, Self::REQUIRED, Self::OPTIONAL)?;

        let cached = params.boolean(n, "cached")?;
        let cached_data = params.opt_path(n, "cached_data")?;
        if cached && cached_data.is_none() {
            return Err(ConfigurationError::new(format!(
                "{}: cached = true requires 'cached_data'",
                n
            )));
        }
        let cpus = params.unsigned(n, "cpus")? as usize;
        if cpus == 0 {
            return Err(ConfigurationError::new(format!("{}: cpus must be positive", n)));
        }

        let load_intermediate = params.opt_string(n, "load_intermediate")?;
        let save_intermediates = params.opt_boolean(n, "save_intermediates", false)?;
        let intermediates_directory = params.opt_path(n, "intermediates_directory")?;
        if let Some(stage) = &load_intermediate {
            if !STAGES.contains(&stage.as_str()) {
                return Err(ConfigurationError::new(format!(
                    "{}: unknown stage '{}' (stages: {:?})",
                    n, stage, STAGES
                )));
            }
        }
        if (save_intermediates || load_intermediate.is_some()) && intermediates_directory.is_none() {
            return Err(ConfigurationError::new(format!(
                "{}: intermediates require 'intermediates_directory'",
                n
            )));
        }

        Ok(Self {
            cached,
            cached_data,
            input_data: params.path(n, "input_data")?,
            output_data: params.path(n, "output_data")?,
            output_metrics_data: params.path(n, "output_metrics_data")?,
            cpus,
            options: FitOptions {
                debug: params.boolean(n, "debug")?,
                disable_ribosome_capacity_fitting: params
                    .boolean(n, "disable_ribosome_capacity_fitting")?,
                disable_rnapoly_capacity_fitting: params
                    .boolean(n, "disable_rnapoly_capacity_fitting")?,
                variable_elongation_transcription: params.opt_boolean(
                    n,
                    "variable_elongation_transcription",
                    false,
                )?,
                variable_elongation_translation: params.opt_boolean(
                    n,
                    "variable_elongation_translation",
                    false,
                )?,
            },
            load_intermediate,
            save_intermediates,
            intermediates_directory,
            params,
        })
    }

    fn intermediate_path(dir: &Path, stage: &str) -> PathBuf {
        dir.join(format!("sim_data_{}.bin", stage))
    }

    /// Copies the cache artifact into place and writes its metrics.
    fn use_cache(&self, store: &ArtifactStore, cached_data: &Path) -> Result<DateTime<Local>> {
        store
            .copy(cached_data, &self.output_data)
            .map_err(PipelineError::from_cache)?;
        let sim_data: SimData = store
            .load(&self.output_data)
            .map_err(PipelineError::from_cache)?;
        store.save(&self.output_metrics_data, &MetricsData::from_sim_data(&sim_data))?;
        Ok(store.modified(cached_data)?)
    }

    fn recompute(&self, store: &ArtifactStore) -> Result<()> {
        let raw: RawData = store.load(&self.input_data)?;
        let resume = match (&self.load_intermediate, &self.intermediates_directory) {
            (Some(stage), Some(dir)) => {
                let path = Self::intermediate_path(dir, stage);
                tracing::info!(stage = %stage, path = ?path, "Loading fit intermediate");
                Some(store.load::<SimData, _>(&path)?)
            }
            _ => None,
        };

        let fitter = Fitter::new(&raw, self.options.clone(), self.cpus)?;
        let sim_data = fitter.fit(resume, |stage, data| {
            if let (true, Some(dir)) = (self.save_intermediates, &self.intermediates_directory) {
                store.save(Self::intermediate_path(dir, stage), data)?;
            }
            Ok(())
        })?;

        store.save(&self.output_data, &sim_data)?;
        store.save(&self.output_metrics_data, &MetricsData::from_sim_data(&sim_data))?;
        tracing::info!(
            output = ?self.output_data,
            molecules = sim_data.molecules.len(),
            stages = sim_data.completed_stages.len(),
            "Fitted simulation data"
        );
        Ok(())
    }

    /// Tries the cache when requested, falling back to a full fit.
    pub fn execute(&self, store: &ArtifactStore) -> CacheOutcome {
        let mut cache_error = None;
        if let (true, Some(cached_data)) = (self.cached, &self.cached_data) {
            match self.use_cache(store, cached_data) {
                Ok(modified) => {
                    tracing::info!(
                        cache = ?cached_data,
                        modified = %modified.format("%Y-%m-%d %H:%M:%S"),
                        "Copied cached simulation data"
                    );
                    return CacheOutcome::Cached { modified };
                }
                Err(e) => {
                    tracing::warn!(
                        cache = ?cached_data,
                        error = %e,
                        "Could not use cached simulation data, recomputing"
                    );
                    cache_error = Some(e);
                }
            }
        }
        match self.recompute(store) {
            Ok(()) => CacheOutcome::Recomputed { cache_error },
            Err(e) => CacheOutcome::Failed(e),
        }
    }
}

impl Task for FitSimData {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> &TaskParams {
        &self.params
    }

    fn inputs(&self) -> Vec<PathBuf> {
        let mut inputs = vec![self.input_data.clone()];
        if let (Some(stage), Some(dir)) = (&self.load_intermediate, &self.intermediates_directory) {
            inputs.push(Self::intermediate_path(dir, stage));
        }
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output_data.clone(), self.output_metrics_data.clone()]
    }

    fn run(&self, store: &ArtifactStore) -> Result<TaskOutcome> {
        match self.execute(store) {
            CacheOutcome::Cached { modified } => Ok(TaskOutcome::Cached {
                modified: modified.to_rfc3339(),
            }),
            CacheOutcome::Recomputed { cache_error: None } => Ok(TaskOutcome::Completed),
            CacheOutcome::Recomputed {
                cache_error: Some(e),
            } => Ok(TaskOutcome::Recomputed {
                reason: e.to_string(),
            }),
            CacheOutcome::Failed(e) => Err(e),
        }
    }

    fn describe(&self) -> TaskManifest {
        let value = |key: &str| self.params.get(key).cloned();
        TaskManifest::new(
            Self::NAME,
            Self::KIND,
            "Fits simulation parameters to the raw knowledge base.",
        )
        .input("input_data", value("input_data"), "Raw knowledge base", Some("binary artifact (raw_data)"))
        .input("cached", value("cached"), "Copy cached_data instead of fitting", None)
        .input("cached_data", value("cached_data"), "Previously fitted simulation data", Some("binary artifact (sim_data)"))
        .input("cpus", value("cpus"), "Worker threads for per-molecule stages", None)
        .input("debug", value("debug"), "Fit a reduced problem", None)
        .input(
            "disable_ribosome_capacity_fitting",
            value("disable_ribosome_capacity_fitting"),
            "Keep the measured ribosome count",
            None,
        )
        .input(
            "disable_rnapoly_capacity_fitting",
            value("disable_rnapoly_capacity_fitting"),
            "Keep the measured RNA polymerase count",
            None,
        )
        .input(
            "variable_elongation_transcription",
            value("variable_elongation_transcription"),
            "Variable transcription elongation rates",
            None,
        )
        .input(
            "variable_elongation_translation",
            value("variable_elongation_translation"),
            "Variable translation elongation rates",
            None,
        )
        .input("load_intermediate", value("load_intermediate"), "Stage to resume after", None)
        .input("save_intermediates", value("save_intermediates"), "Persist every stage", None)
        .input("intermediates_directory", value("intermediates_directory"), "Directory of stage intermediates", None)
        .output("output_data", "Fitted simulation data", "binary artifact (sim_data)")
        .output("output_metrics_data", "Summary metrics of the fit", "binary artifact (metrics_data)")
        .methods(&format!("Runs the fit stages in order: {}.", STAGES.join(", ")))
        .categories(&["data processing", "simulation setup"])
    }
}
