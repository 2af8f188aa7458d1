use crate::error::{ConfigurationError, Result};
use crate::model::knowledge_base;
use crate::pipeline::manifest::TaskManifest;
use crate::pipeline::params::TaskParams;
use crate::pipeline::task::{Task, TaskOutcome};
use progenitor_data::RawDataOptions;
use progenitor_io::ArtifactStore;
use std::path::PathBuf;

/// Instantiates the reference knowledge base.
#[derive(Debug)]
pub struct InitRawData {
    params: TaskParams,
    output: PathBuf,
    options: RawDataOptions,
}

impl InitRawData {
    pub const KIND: &'static str = "init_raw_data";
    const NAME: &'static str = "InitRawDataTask";
    const REQUIRED: &'static [&'static str] = &["output"];
    const OPTIONAL: &'static [&'static str] = &[
        "operons",
        "new_genes",
        "protein_degradation_combo",
        "remove_rrna_operons",
        "remove_rrff",
        "stable_rrna",
    ];

    pub fn from_params(params: TaskParams) -> std::result::Result<Self, ConfigurationError> {
        params.check(Self::NAME, Self::REQUIRED, Self::OPTIONAL)?;
        let defaults = RawDataOptions::default();
        let options = RawDataOptions {
            operons: params
                .opt_string(Self::NAME, "operons")?
                .unwrap_or(defaults.operons),
            new_genes: params
                .opt_string(Self::NAME, "new_genes")?
                .unwrap_or(defaults.new_genes),
            protein_degradation_combo: params
                .opt_string(Self::NAME, "protein_degradation_combo")?
                .unwrap_or(defaults.protein_degradation_combo),
            remove_rrna_operons: params.opt_boolean(
                Self::NAME,
                "remove_rrna_operons",
                defaults.remove_rrna_operons,
            )?,
            remove_rrff: params.opt_boolean(Self::NAME, "remove_rrff", defaults.remove_rrff)?,
            stable_rrna: params.opt_boolean(Self::NAME, "stable_rrna", defaults.stable_rrna)?,
        };
        knowledge_base::validate_options(&options)?;
        Ok(Self {
            output: params.path(Self::NAME, "output")?,
            params,
            options,
        })
    }
}

impl Task for InitRawData {
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
        tracing::info!(output = ?self.output, "Instantiating raw data");
        let raw = knowledge_base::build_raw_data(&self.options)?;
        store.save(&self.output, &raw)?;
        Ok(TaskOutcome::Completed)
    }

    fn describe(&self) -> TaskManifest {
        let option = |key: &str| self.params.get(key).cloned();
        TaskManifest::new(
            Self::NAME,
            Self::KIND,
            "Instantiates the reference knowledge base with the chosen options.",
        )
        .input("operons", option("operons"), "Whether co-transcribed genes share expression", None)
        .input("new_genes", option("new_genes"), "New-gene set to insert", None)
        .input(
            "protein_degradation_combo",
            option("protein_degradation_combo"),
            "Protein degradation rate combination",
            None,
        )
        .input("remove_rrna_operons", option("remove_rrna_operons"), "Drop the removable rRNA operon", None)
        .input("remove_rrff", option("remove_rrff"), "Drop the rrfF gene", None)
        .input("stable_rrna", option("stable_rrna"), "Treat rRNA as stable", None)
        .output("output", "Raw knowledge base", "binary artifact (raw_data)")
        .methods("Builds genes, molecules, reactions and the basal medium from built-in tables.")
        .categories(&["initialization", "data processing"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_output_rejected() {
        let err = InitRawData::from_params(TaskParams::new()).unwrap_err();
        assert!(err.0.contains("output"));
    }

    #[test]
    fn test_bad_option_rejected_at_construction() {
        let params = TaskParams::new()
            .with("output", "kb/raw.bin")
            .with("operons", "sometimes");
        assert!(InitRawData::from_params(params).is_err());
    }

    #[test]
    fn test_run_writes_raw_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let task = InitRawData::from_params(
            TaskParams::new()
                .with("output", "kb/raw.bin")
                .with("remove_rrff", true),
        )
        .unwrap();
        assert_eq!(task.run(&store).unwrap(), TaskOutcome::Completed);
        let raw: progenitor_data::RawData = store.load("kb/raw.bin").unwrap();
        assert!(raw.options.remove_rrff);
        assert!(raw.gene("rrfF").is_none());
    }
}
