//! # Progenitor
//!
//! Whole-cell simulation pipeline: a reference knowledge base is fitted into
//! simulation parameters, optionally transformed by variants, and simulated
//! cell by cell with the tiered scheduler of `progenitor_core`.

pub mod error;
pub mod model;
pub mod pipeline;

pub use error::{ConfigurationError, PipelineError};
