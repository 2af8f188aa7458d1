//! Error types of the model and pipeline layers.

use progenitor_core::SimulationError;
use progenitor_io::StoreError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid parameters, unknown names or out-of-range indices.
///
/// Always raised before any artifact is read or written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error: {0}")]
pub struct ConfigurationError(pub String);

impl ConfigurationError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("fit stage {stage} failed: {reason}")]
    Fit { stage: String, reason: String },

    /// A cache artifact that does not exist.
    #[error("cache miss: {0}")]
    CacheMiss(String),

    /// A cache artifact that exists but cannot be used.
    #[error("cache corrupt: {0}")]
    CacheCorrupt(String),

    #[error("artifact unavailable: {}", .0.display())]
    ArtifactUnavailable(PathBuf),

    #[error("task {task} timed out after {after:?}")]
    Timeout { task: String, after: Duration },

    #[error("task {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },
}

impl PipelineError {
    /// Sorts a store failure on the cache path into miss or corrupt.
    #[must_use]
    pub fn from_cache(err: StoreError) -> Self {
        if err.is_missing() {
            Self::CacheMiss(err.to_string())
        } else {
            Self::CacheCorrupt(err.to_string())
        }
    }

    pub fn task_failed<S: Into<String>, R: Into<String>>(task: S, reason: R) -> Self {
        Self::TaskFailed {
            task: task.into(),
            reason: reason.into(),
        }
    }

    /// Retrying cannot help with these.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ArtifactUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
