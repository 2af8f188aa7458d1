use crate::error::{ConfigurationError, Result};
use crate::model::variants;
use crate::pipeline::manifest::TaskManifest;
use crate::pipeline::params::TaskParams;
use crate::pipeline::task::{Task, TaskOutcome};
use progenitor_data::SimData;
use progenitor_io::ArtifactStore;
use std::path::PathBuf;

/// Applies one indexed variant to fitted simulation data.
#[derive(Debug)]
pub struct VariantSimData {
    params: TaskParams,
    variant_function: String,
    variant_index: u32,
    input_sim_data: PathBuf,
    output_sim_data: PathBuf,
    variant_metadata_directory: PathBuf,
}

impl VariantSimData {
    pub const KIND: &'static str = "variant_sim_data";
    const NAME: &'static str = "VariantSimDataTask";
    const REQUIRED: &'static [&'static str] = &[
        "variant_function",
        "variant_index",
        "input_sim_data",
        "output_sim_data",
        "variant_metadata_directory",
    ];

    pub fn from_params(params: TaskParams) -> std::result::Result<Self, ConfigurationError> {
        let n = Self::NAME;
        params.check(n, Self::REQUIRED, &[])?;
        let variant_function = params.string(n, "variant_function")?;
        let variant_index = u32::try_from(params.unsigned(n, "variant_index")?)
            .map_err(|_| ConfigurationError::new(format!("{}: variant_index too large", n)))?;
        variants::check_index(&variant_function, variant_index)
            .map_err(|e| ConfigurationError::new(format!("{}: {}", n, e.0)))?;
        Ok(Self {
            variant_function,
            variant_index,
            input_sim_data: params.path(n, "input_sim_data")?,
            output_sim_data: params.path(n, "output_sim_data")?,
            variant_metadata_directory: params.path(n, "variant_metadata_directory")?,
            params,
        })
    }
}

impl Task for VariantSimData {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> &TaskParams {
        &self.params
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.input_sim_data.clone()]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![
            self.output_sim_data.clone(),
            self.variant_metadata_directory.join("short_name"),
            self.variant_metadata_directory.join("description"),
        ]
    }

    fn run(&self, store: &ArtifactStore) -> Result<TaskOutcome> {
        let sim_data: SimData = store.load(&self.input_sim_data)?;
        let (metadata, variant) =
            variants::apply_variant(&sim_data, &self.variant_function, self.variant_index)?;

        store.create_dir_all(&self.variant_metadata_directory)?;
        if let Some(parent) = self.output_sim_data.parent() {
            store.create_dir_all(parent)?;
        }
        store.save(&self.output_sim_data, &variant)?;
        store.write_text(
            self.variant_metadata_directory.join("short_name"),
            &format!("{}\n", metadata.short_name),
        )?;
        store.write_text(
            self.variant_metadata_directory.join("description"),
            &format!("{}\n", metadata.description),
        )?;
        tracing::info!(
            variant = %self.variant_function,
            index = self.variant_index,
            short_name = %metadata.short_name,
            "Variant applied"
        );
        Ok(TaskOutcome::Completed)
    }

    fn describe(&self) -> TaskManifest {
        let value = |key: &str| self.params.get(key).cloned();
        TaskManifest::new(
            Self::NAME,
            Self::KIND,
            "Applies a variant function to fitted simulation data.",
        )
        .input("variant_function", value("variant_function"), "Name of the variant function", None)
        .input("variant_index", value("variant_index"), "Index passed to the variant function", None)
        .input(
            "input_sim_data",
            value("input_sim_data"),
            "Fitted simulation data",
            Some("binary artifact (sim_data)"),
        )
        .input(
            "variant_metadata_directory",
            value("variant_metadata_directory"),
            "Directory for the variant side files",
            None,
        )
        .output("output_sim_data", "Modified simulation data", "binary artifact (sim_data)")
        .output("short_name", "Short variant name", "text, one line")
        .output("description", "Variant description", "text, one line")
        .methods(&format!(
            "Known variant functions: {}.",
            variants::names().collect::<Vec<_>>().join(", ")
        ))
        .categories(&["initialization", "variants"])
    }
}
