use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, PartialEq, Eq))]
/// Broad chemical class of a knowledge-base molecule.
pub enum MoleculeClass {
    /// Small molecules and building blocks (NTPs, amino acids, ATP).
    Metabolite,
    /// Transcripts, including stable rRNA/tRNA species.
    Rna,
    /// Protein monomers.
    Protein,
    /// Macromolecular complexes formed from other molecules.
    Complex,
}

/// One countable molecular species of the reference knowledge base.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct Molecule {
    pub id: String,
    pub class: MoleculeClass,
    /// Mass of a single copy in femtograms.
    pub mass_fg: f64,
    /// Measured copy number in an average newborn cell.
    pub initial_count: u64,
    /// Half life in seconds; `0.0` marks a stable species.
    pub half_life_s: f64,
}

/// A gene and the molecules it gives rise to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct Gene {
    pub id: String,
    /// Transcript produced by this gene.
    pub rna_id: String,
    /// Protein monomer translated from the transcript, if coding.
    pub monomer_id: Option<String>,
    /// Relative expression weight (arbitrary units, summed over all genes).
    pub expression: f64,
    /// Whether this gene belongs to an rRNA operon.
    pub is_rrna: bool,
}

/// A participant of a reaction with its stoichiometric coefficient.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct StoichTerm {
    pub molecule: String,
    pub coefficient: u32,
}

impl StoichTerm {
    pub fn new(molecule: &str, coefficient: u32) -> Self {
        Self {
            molecule: molecule.to_string(),
            coefficient,
        }
    }
}

/// A mass-balanced conversion between molecules.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct Reaction {
    pub id: String,
    pub reactants: Vec<StoichTerm>,
    pub products: Vec<StoichTerm>,
    /// Reaction events per second at reference conditions.
    pub rate_per_s: f64,
}

/// A nutrient pool of the growth medium.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct MediaComponent {
    pub id: String,
    /// Copies available in the local environment at time zero.
    pub amount: u64,
    /// Internal metabolite the nutrient becomes once imported.
    pub imported_as: String,
    /// Maximum import events per second.
    pub import_rate_per_s: f64,
}

/// Options chosen when the knowledge base is instantiated.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct RawDataOptions {
    /// `"on"` merges co-transcribed genes into operons.
    pub operons: String,
    /// Name of the new-gene set to insert, `"off"` for none.
    pub new_genes: String,
    /// Name of the protein degradation rate combination.
    pub protein_degradation_combo: String,
    pub remove_rrna_operons: bool,
    pub remove_rrff: bool,
    pub stable_rrna: bool,
}

impl Default for RawDataOptions {
    fn default() -> Self {
        Self {
            operons: "off".to_string(),
            new_genes: "off".to_string(),
            protein_degradation_combo: "default".to_string(),
            remove_rrna_operons: false,
            remove_rrff: false,
            stable_rrna: false,
        }
    }
}

/// Immutable bundle of reference knowledge: genes, molecules, reactions and
/// the growth medium.
///
/// Built once by the raw-data task and only ever read afterwards; nothing in
/// the workspace hands out a mutable reference to a loaded instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct RawData {
    pub options: RawDataOptions,
    pub genes: Vec<Gene>,
    pub molecules: Vec<Molecule>,
    pub reactions: Vec<Reaction>,
    pub media: Vec<MediaComponent>,
    /// Reference doubling time in seconds.
    pub doubling_time_s: f64,
}

impl RawData {
    #[must_use]
    pub fn molecule(&self, id: &str) -> Option<&Molecule> {
        self.molecules.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn gene(&self, id: &str) -> Option<&Gene> {
        self.genes.iter().find(|g| g.id == id)
    }

    /// Total dry mass of a newborn cell built from the reference counts.
    #[must_use]
    pub fn initial_dry_mass_fg(&self) -> f64 {
        self.molecules
            .iter()
            .map(|m| m.mass_fg * m.initial_count as f64)
            .sum()
    }
}
