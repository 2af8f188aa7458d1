//! Plain data model shared by every Progenitor crate.
//!
//! Nothing in here knows how to fit, simulate or store anything. The types
//! derive both `serde` (for JSON side files and manifests) and `rkyv` (for the
//! binary artifacts exchanged between pipeline tasks).

pub mod data;

pub use data::knowledge::{
    Gene, MediaComponent, Molecule, MoleculeClass, RawData, RawDataOptions, Reaction, StoichTerm,
};
pub use data::record::{GrantRecord, ListenerRecord, RecordValue};
pub use data::sim_data::{
    AppliedVariant, BindingParams, FitOptions, MetricsData, MoleculeParams, ReactionParams, SimData,
};
pub use data::state::{BulkCount, CellState, DaughterPair, MediaCount, UniqueObject};
pub use data::validation::{RawValidationData, ReferenceMeasurement, ValidationData, ValidationTarget};
pub use data::variant::{Variant, VariantMetadata};
