//! Tasks that build the experimental validation bundle.

use crate::error::{ConfigurationError, Result};
use crate::model::validation::{build_raw_validation_data, process_validation_data};
use crate::pipeline::manifest::TaskManifest;
use crate::pipeline::params::TaskParams;
use crate::pipeline::task::{Task, TaskOutcome};
use progenitor_data::{RawData, RawValidationData};
use progenitor_io::ArtifactStore;
use std::path::PathBuf;

#[derive(Debug)]
pub struct InitRawValidationData {
    params: TaskParams,
    output: PathBuf,
}

impl InitRawValidationData {
    pub const KIND: &'static str = "init_raw_validation_data";
    const NAME: &'static str = "InitRawValidationDataTask";

    pub fn from_params(params: TaskParams) -> std::result::Result<Self, ConfigurationError> {
        params.check(Self::NAME, &["output"], &[])?;
        Ok(Self {
            output: params.path(Self::NAME, "output")?,
            params,
        })
    }
}

impl Task for InitRawValidationData {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> &TaskParams {
        &self.params
    }

    fn inputs(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output.clone()]
    }

    fn run(&self, store: &ArtifactStore) -> Result<TaskOutcome> {
        let raw = build_raw_validation_data();
        tracing::info!(measurements = raw.measurements.len(), "Raw validation data built");
        store.save(&self.output, &raw)?;
        Ok(TaskOutcome::Completed)
    }

    fn describe(&self) -> TaskManifest {
        TaskManifest::new(
            Self::NAME,
            Self::KIND,
            "Bundles the built-in experimental reference datasets.",
        )
        .output("output", "Raw validation data", "binary artifact (raw_validation_data)")
        .methods("Collects per-dataset copy-number measurements and the observed doubling time.")
        .categories(&["initialization", "validation"])
    }
}

#[derive(Debug)]
pub struct InitValidationData {
    params: TaskParams,
    validation_data_input: PathBuf,
    knowledge_base_raw: PathBuf,
    output_data: PathBuf,
}

impl InitValidationData {
    pub const KIND: &'static str = "init_validation_data";
    const NAME: &'static str = "InitValidationDataTask";
    const REQUIRED: &'static [&'static str] =
        &["validation_data_input", "knowledge_base_raw", "output_data"];

    pub fn from_params(params: TaskParams) -> std::result::Result<Self, ConfigurationError> {
        params.check(Self::NAME, Self::REQUIRED, &[])?;
        Ok(Self {
            validation_data_input: params.path(Self::NAME, "validation_data_input")?,
            knowledge_base_raw: params.path(Self::NAME, "knowledge_base_raw")?,
            output_data: params.path(Self::NAME, "output_data")?,
            params,
        })
    }
}

impl Task for InitValidationData {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> &TaskParams {
        &self.params
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.validation_data_input.clone(), self.knowledge_base_raw.clone()]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output_data.clone()]
    }

    fn run(&self, store: &ArtifactStore) -> Result<TaskOutcome> {
        let raw_validation: RawValidationData = store.load(&self.validation_data_input)?;
        let raw: RawData = store.load(&self.knowledge_base_raw)?;
        let processed = process_validation_data(&raw_validation, &raw);
        if !processed.unmatched.is_empty() {
            tracing::warn!(
                unmatched = ?processed.unmatched,
                "Validation measurements reference unknown molecules"
            );
        }
        store.save(&self.output_data, &processed)?;
        Ok(TaskOutcome::Completed)
    }

    fn describe(&self) -> TaskManifest {
        let value = |key: &str| self.params.get(key).cloned();
        TaskManifest::new(
            Self::NAME,
            Self::KIND,
            "Processes raw validation data against the knowledge base.",
        )
        .input(
            "validation_data_input",
            value("validation_data_input"),
            "Raw validation data",
            Some("binary artifact (raw_validation_data)"),
        )
        .input(
            "knowledge_base_raw",
            value("knowledge_base_raw"),
            "Raw knowledge base",
            Some("binary artifact (raw_data)"),
        )
        .output("output_data", "Validation targets", "binary artifact (validation_data)")
        .methods("Averages replicate measurements and weights them by molecular mass.")
        .categories(&["initialization", "validation"])
    }
}
