//! # Progenitor IO
//!
//! Persistence layer shared by pipeline tasks and simulations.
//!
//! This crate provides:
//! - Structured error handling for artifact access
//! - A versioned, checksummed binary envelope around `rkyv` archives
//! - The path-addressed [`ArtifactStore`] with atomic writes
//! - JSON helpers for manifests and side files
//! - Compressed listener record files

/// Versioned binary envelope and the [`Artifact`] trait
pub mod envelope;
/// Error types and result aliases for artifact operations
pub mod error;
/// Cancellation of artifact publishing
pub mod gate;
/// Listener record files (gzip-compressed JSON lines)
pub mod records;
/// Validated JSON serialization helpers
pub mod serialization;
/// Path-addressed artifact store
pub mod store;

pub use envelope::{decode, encode, Artifact, DepthBudget};
pub use error::{Result, StoreError};
pub use gate::{CloseOnDrop, PublishGate};
pub use records::{read_records, RecordWriter};
pub use serialization::{from_json, to_json, to_json_pretty, write_json_file};
pub use store::ArtifactStore;
