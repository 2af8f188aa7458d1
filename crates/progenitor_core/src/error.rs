//! Error types raised while stepping a simulation.

use progenitor_data::CellState;
use thiserror::Error;

/// Failure inside a single process unit.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("unknown molecule {0}")]
    UnknownMolecule(String),

    #[error("unknown unique object {0}")]
    UnknownObject(u64),

    /// The unit tried to consume more than it was granted.
    #[error("{resource}: consumed {used} but only {granted} was granted")]
    ExceedsGrant {
        resource: String,
        used: u64,
        granted: u64,
    },

    #[error("{0}")]
    Failed(String),
}

impl ProcessError {
    #[must_use]
    pub fn failed<S: Into<String>>(msg: S) -> Self {
        Self::Failed(msg.into())
    }
}

/// Errors that abort a simulation step.
///
/// A step that returns any of these commits nothing: the state the scheduler
/// holds is exactly the state before the step began.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("resource conservation violated at step {step}, tier {tier}, {resource}: {detail}")]
    ResourceConservationViolation {
        step: u64,
        tier: usize,
        resource: String,
        detail: String,
        /// Committed state at the start of the failed step.
        diagnostics: Box<CellState>,
    },

    #[error("unit {unit} failed at step {step}, tier {tier}: {source}")]
    UnitExecutionFailure {
        step: u64,
        tier: usize,
        unit: String,
        source: ProcessError,
    },

    #[error("record sink failed at step {step}: {source}")]
    RecordSink {
        step: u64,
        source: std::io::Error,
    },

    #[error("simulation already terminated at step {0}")]
    Terminated(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SimulationError {
    #[must_use]
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Step index the error refers to, if any.
    #[must_use]
    pub fn step(&self) -> Option<u64> {
        match self {
            Self::ResourceConservationViolation { step, .. }
            | Self::UnitExecutionFailure { step, .. }
            | Self::RecordSink { step, .. }
            | Self::Terminated(step) => Some(*step),
            Self::Configuration(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
