use super::manifest::TaskManifest;
use super::params::TaskParams;
use crate::error::Result;
use progenitor_io::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a successful task produced its outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    /// Outputs copied from a cache artifact last modified at `modified`.
    Cached { modified: String },
    /// The cache could not be used and the outputs were recomputed.
    Recomputed { reason: String },
}

/// A unit of pipeline work.
///
/// Tasks never share memory: everything a task consumes is named by
/// [`Task::inputs`] and everything it produces by [`Task::outputs`], both as
/// paths relative to the artifact store root. Construction validates the
/// parameter map; `run` is the first point at which a task does I/O.
pub trait Task: Send + Sync {
    /// Registered task type, e.g. `"fit_sim_data"`.
    fn kind(&self) -> &'static str;

    fn params(&self) -> &TaskParams;

    fn inputs(&self) -> Vec<PathBuf>;

    fn outputs(&self) -> Vec<PathBuf>;

    fn run(&self, store: &ArtifactStore) -> Result<TaskOutcome>;

    fn describe(&self) -> TaskManifest;
}

/// Serializable form of a task: its type and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task: String,
    pub params: TaskParams,
}

impl TaskSpec {
    pub fn new(task: &str, params: TaskParams) -> Self {
        Self {
            task: task.to_string(),
            params,
        }
    }
}
