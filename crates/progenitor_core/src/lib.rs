//! # Progenitor Core
//!
//! The cell simulation engine: shared state, resource partitioning and the
//! tiered step scheduler.
//!
//! This crate contains:
//! - Configuration for simulations and pipeline runs
//! - State partitions (bulk molecules, unique objects, local environment)
//! - Two-phase allocation with a configurable over-subscription policy
//! - Process units and the registry that builds them by name
//! - The tiered scheduler, listeners and division policy
//! - Metrics collection and structured logging
//!
//! ## Example
//!
//! ```
//! use progenitor_core::state::{partition, AllocationPolicy};
//!
//! // Two units ask for 80 copies each of a pool of 100.
//! let grants = partition(AllocationPolicy::Proportional, 100, &[80, 80]);
//! assert_eq!(grants, vec![50, 50]);
//! ```

/// Configuration management for simulations and pipeline runs
pub mod config;
/// Division criterion and conservative state splitting
pub mod division;
/// Step-level error types
pub mod error;
/// Read-only observers and record sinks
pub mod listener;
/// Performance metrics collection and logging
pub mod metrics;
/// Process unit trait, deltas and built-in units
pub mod process;
/// Tier registry and the step scheduler
pub mod scheduler;
/// State partitions and allocation
pub mod state;

pub use config::AppConfig;
pub use division::{DivisionPolicy, MassDoublingDivision};
pub use error::{ProcessError, SimulationError};
pub use listener::{Listener, ListenerLog, RecordSink};
pub use metrics::{init_logging, Metrics};
pub use process::{Delta, Process, ProcessRegistry, StepContext};
pub use scheduler::{Scheduler, SchedulerOptions, TierRegistry};
pub use state::{AllocationPolicy, ResourceKey, SimulationState};
