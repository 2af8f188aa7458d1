//! Tiered step scheduler.
//!
//! State machine per step:
//!
//! ```text
//! Idle -> TierExecuting(0) -> .. -> TierExecuting(n-1) -> ListenersRunning
//!      -> DivisionCheck -> StepComplete (next step) | Terminated (divided)
//! ```
//!
//! Tier `i + 1` never starts before every delta of tier `i` is merged.

pub mod engine;
pub mod tiers;

pub use engine::{apply_delta, Phase, RunEnd, Scheduler, SchedulerOptions, StepOutcome};
pub use tiers::{Tier, TierDefinition, TierRegistry};
