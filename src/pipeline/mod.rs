//! Tasks, their orchestration and the standard workflow.

pub mod manifest;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod runner;
pub mod task;
pub mod tasks;
pub mod workflow;

pub use manifest::TaskManifest;
pub use orchestrator::{Orchestrator, OrchestratorOptions, PipelineReport};
pub use params::TaskParams;
pub use registry::TaskRegistry;
pub use runner::{InProcessRunner, SubprocessRunner, TaskRunner};
pub use task::{Task, TaskOutcome, TaskSpec};
