//! Configuration management for simulations and pipeline runs.
//!
//! This module provides strongly-typed configuration structures that map to
//! the `config.toml` file.
//!
//! ## Configuration Hierarchy
//!
//! 1. Default values (hardcoded in `Default` impls)
//! 2. `config.toml` file (overrides defaults, section by section)
//! 3. Command line flags (output directory, cache switch)
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [simulation]
//! seed = 7
//! max_steps = 5000
//!
//! [allocation]
//! policy = "proportional"
//!
//! [pipeline]
//! variant_function = "double_x"
//! first_variant_index = 0
//! last_variant_index = 2
//! generations = 2
//! ```

use crate::state::AllocationPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-run simulation settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Hard stop for a single generation when division never triggers.
    pub max_steps: u64,
    /// Overrides the time step stored in the fitted data when set.
    pub time_step_s: Option<f64>,
    /// Progress is logged every this many steps.
    pub log_every: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_steps: 10_800,
            time_step_s: None,
            log_every: 1000,
        }
    }
}

/// How over-subscribed resources are partitioned inside a tier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AllocationConfig {
    pub policy: AllocationPolicy,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DivisionConfig {
    pub enabled: bool,
    /// Dry mass fold change (relative to the newborn cell) that triggers division.
    pub mass_fold_threshold: f64,
}

impl Default for DivisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mass_fold_threshold: 2.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory every relative artifact path resolves against.
    pub root: PathBuf,
    /// Initial serialization depth budget.
    pub depth_budget: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("out"),
            depth_budget: 1000,
        }
    }
}

/// Shape of the standard workflow and execution limits of the orchestrator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub variant_function: String,
    pub first_variant_index: u32,
    pub last_variant_index: u32,
    /// Independent lineages simulated per variant.
    pub seeds: u32,
    pub generations: u32,
    pub run_validation: bool,
    /// Copy a pre-existing fitted artifact instead of fitting.
    pub cached: bool,
    pub cached_data: Option<PathBuf>,
    /// Worker threads used by the fitter.
    pub cpus: usize,
    pub save_intermediates: bool,
    pub debug_fit: bool,
    /// Tasks running longer than this are killed and reported failed.
    pub task_timeout_s: u64,
    pub max_retries: u32,
    pub max_parallel: usize,
    /// Run every task in its own process, killed on timeout. In-process
    /// attempts that time out are only stopped from publishing.
    pub isolate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variant_function: "wildtype".to_string(),
            first_variant_index: 0,
            last_variant_index: 0,
            seeds: 1,
            generations: 1,
            run_validation: false,
            cached: false,
            cached_data: None,
            cpus: 1,
            save_intermediates: false,
            debug_fit: false,
            task_timeout_s: 3600,
            max_retries: 1,
            max_parallel: 4,
            isolate: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub allocation: AllocationConfig,
    pub division: DivisionConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validates all configuration parameters.
    ///
    /// Returns `Ok(())` if all parameters are valid, or `Err` with a description
    /// of the first validation failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.simulation.max_steps > 0, "max_steps must be positive");
        anyhow::ensure!(self.simulation.log_every > 0, "log_every must be positive");
        if let Some(dt) = self.simulation.time_step_s {
            anyhow::ensure!(dt > 0.0 && dt.is_finite(), "time_step_s must be positive");
        }

        anyhow::ensure!(
            self.division.mass_fold_threshold > 1.0,
            "Division mass threshold must exceed 1.0"
        );

        anyhow::ensure!(
            self.store.depth_budget > 0,
            "Serialization depth budget must be positive"
        );

        anyhow::ensure!(
            !self.pipeline.variant_function.is_empty(),
            "variant_function must not be empty"
        );
        anyhow::ensure!(
            self.pipeline.first_variant_index <= self.pipeline.last_variant_index,
            "first_variant_index must not exceed last_variant_index"
        );
        anyhow::ensure!(self.pipeline.seeds > 0, "At least one seed is required");
        anyhow::ensure!(
            self.pipeline.generations > 0,
            "At least one generation is required"
        );
        anyhow::ensure!(self.pipeline.cpus > 0, "cpus must be positive");
        anyhow::ensure!(
            self.pipeline.max_parallel > 0,
            "max_parallel must be positive"
        );
        anyhow::ensure!(
            self.pipeline.task_timeout_s > 0,
            "task_timeout_s must be positive"
        );
        anyhow::ensure!(
            !self.pipeline.cached || self.pipeline.cached_data.is_some(),
            "cached = true requires cached_data"
        );

        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = ?path, "No config file, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Hash of the sections that change simulation results.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.simulation).as_bytes());
        hasher.update(format!("{:?}", self.allocation).as_bytes());
        hasher.update(format!("{:?}", self.division).as_bytes());
        hex::encode(hasher.finalize())
    }
}
