use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Copy number of one bulk species.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct BulkCount {
    pub id: String,
    pub count: u64,
}

/// An individually tracked object (bound factor, polymerase, fork...).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct UniqueObject {
    pub id: u64,
    pub kind: String,
    pub mass_fg: f64,
    pub created_step: u64,
}

/// Amount of a nutrient left in the local environment.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct MediaCount {
    pub id: String,
    pub amount: u64,
}

/// Persistable form of a simulation state.
///
/// Used for final states and for the initial state handed to a daughter
/// simulation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct CellState {
    pub cell_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub generation: u32,
    pub step: u64,
    pub time_s: f64,
    pub bulk: Vec<BulkCount>,
    pub unique: Vec<UniqueObject>,
    pub environment: Vec<MediaCount>,
    /// Next id handed to a newly created unique object.
    pub next_unique_id: u64,
}

impl CellState {
    #[must_use]
    pub fn bulk_count(&self, id: &str) -> u64 {
        self.bulk
            .iter()
            .find(|b| b.id == id)
            .map_or(0, |b| b.count)
    }

    #[must_use]
    pub fn unique_count(&self, kind: &str) -> usize {
        self.unique.iter().filter(|u| u.kind == kind).count()
    }
}

/// The two initial states produced when a cell divides.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct DaughterPair {
    pub first: CellState,
    pub second: CellState,
}
