//! Self-descriptions of tasks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestInput {
    pub input: String,
    /// Parameter value the task was constructed with, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestOutput {
    pub output: String,
    pub description: String,
    pub format: String,
}

/// Metadata returned by `Task::describe`. Producing it never touches the
/// artifact store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskManifest {
    pub name: String,
    pub task: String,
    pub comment: String,
    pub inputs: Vec<ManifestInput>,
    pub outputs: Vec<ManifestOutput>,
    pub methods: String,
    pub categories: Vec<String>,
}

impl TaskManifest {
    pub fn new(name: &str, task: &str, comment: &str) -> Self {
        Self {
            name: name.to_string(),
            task: task.to_string(),
            comment: comment.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            methods: String::new(),
            categories: Vec::new(),
        }
    }

    #[must_use]
    pub fn input(
        mut self,
        input: &str,
        value: Option<serde_json::Value>,
        description: &str,
        format: Option<&str>,
    ) -> Self {
        self.inputs.push(ManifestInput {
            input: input.to_string(),
            value,
            description: description.to_string(),
            format: format.map(str::to_string),
        });
        self
    }

    #[must_use]
    pub fn output(mut self, output: &str, description: &str, format: &str) -> Self {
        self.outputs.push(ManifestOutput {
            output: output.to_string(),
            description: description.to_string(),
            format: format.to_string(),
        });
        self
    }

    #[must_use]
    pub fn methods(mut self, methods: &str) -> Self {
        self.methods = methods.to_string();
        self
    }

    #[must_use]
    pub fn categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let manifest = TaskManifest::new("InitRawDataTask", "init_raw_data", "Builds raw data")
            .input("operons", None, "Operon handling", None)
            .output("output", "Raw data", "binary artifact")
            .categories(&["initialization"]);
        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json["inputs"][0].get("value").is_none());
        assert!(json["inputs"][0].get("format").is_none());
        assert_eq!(json["outputs"][0]["format"], "binary artifact");
        assert_eq!(json["categories"][0], "initialization");
    }
}
