use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// A single experimental reference value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct ReferenceMeasurement {
    pub dataset: String,
    pub molecule: String,
    /// Measured copies per cell.
    pub copies_per_cell: f64,
}

/// Raw experimental datasets used to judge simulation output.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Default, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct RawValidationData {
    pub measurements: Vec<ReferenceMeasurement>,
    /// Observed doubling time in seconds.
    pub doubling_time_s: f64,
}

/// Reference target for one molecule that exists in the knowledge base.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct ValidationTarget {
    pub molecule: String,
    /// Mean of all measurements for the molecule.
    pub expected_count: f64,
    /// Share of the reference dry mass carried by the molecule.
    pub mass_fraction: f64,
}

/// Validation data processed against the knowledge base, ready to compare
/// with listener output.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Default, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct ValidationData {
    pub targets: Vec<ValidationTarget>,
    pub expected_doubling_time_s: f64,
    /// Measurements that referenced molecules unknown to the knowledge base.
    pub unmatched: Vec<String>,
}
