use super::knowledge::{MediaComponent, MoleculeClass, StoichTerm};
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// Fitted kinetic parameters of one molecular species.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct MoleculeParams {
    pub id: String,
    pub class: MoleculeClass,
    pub mass_fg: f64,
    pub initial_count: u64,
    /// First-order degradation rate (per second).
    pub degradation_rate_per_s: f64,
    /// Zero-order synthesis rate (copies per second) at `x == 1.0`.
    pub synthesis_rate_per_s: f64,
    /// Building block consumed by synthesis, if any.
    pub precursor: Option<String>,
    /// Precursor copies consumed per synthesised copy.
    pub precursor_cost: u32,
}

/// Fitted parameters of a mass-balanced reaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct ReactionParams {
    pub id: String,
    pub reactants: Vec<StoichTerm>,
    pub products: Vec<StoichTerm>,
    pub rate_per_s: f64,
}

/// Transcription factor binding kinetics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct BindingParams {
    /// Free (bulk) factor that binds.
    pub factor: String,
    /// Kind name of the unique object representing a bound factor.
    pub bound_kind: String,
    pub binding_rate_per_s: f64,
    /// Probability per second that a bound factor lets go.
    pub unbinding_rate_per_s: f64,
}

/// Switches recorded by the fitter.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct FitOptions {
    pub debug: bool,
    pub disable_ribosome_capacity_fitting: bool,
    pub disable_rnapoly_capacity_fitting: bool,
    pub variable_elongation_transcription: bool,
    pub variable_elongation_translation: bool,
}

/// Provenance entry for a variant applied on top of the fitted data.
#[derive(
    Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct AppliedVariant {
    pub function_name: String,
    pub index: u32,
}

/// The fitted parameter set consumed by process units.
///
/// Produced by the fitter and never edited in place afterwards: variants
/// clone it and return a new instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct SimData {
    /// Global growth scaling applied to every synthesis rate.
    pub x: f64,
    /// Name of the media condition the parameters were fitted for.
    pub condition: String,
    pub doubling_time_s: f64,
    pub time_step_s: f64,
    pub molecules: Vec<MoleculeParams>,
    pub reactions: Vec<ReactionParams>,
    pub bindings: Vec<BindingParams>,
    pub media: Vec<MediaComponent>,
    pub fit_options: FitOptions,
    /// Fitting stages completed so far, in order.
    pub completed_stages: Vec<String>,
    pub applied_variants: Vec<AppliedVariant>,
}

impl SimData {
    #[must_use]
    pub fn molecule(&self, id: &str) -> Option<&MoleculeParams> {
        self.molecules.iter().find(|m| m.id == id)
    }

    pub fn molecule_mut(&mut self, id: &str) -> Option<&mut MoleculeParams> {
        self.molecules.iter_mut().find(|m| m.id == id)
    }

    #[must_use]
    pub fn initial_dry_mass_fg(&self) -> f64 {
        self.molecules
            .iter()
            .map(|m| m.mass_fg * m.initial_count as f64)
            .sum()
    }

    /// Number of derivation steps that led to this instance (fit stages
    /// plus applied variants).
    #[must_use]
    pub fn provenance_len(&self) -> usize {
        self.completed_stages.len() + self.applied_variants.len()
    }
}

/// Summary numbers written next to every fitted data set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct MetricsData {
    pub molecule_count: u64,
    pub reaction_count: u64,
    pub initial_dry_mass_fg: f64,
    pub doubling_time_s: f64,
    pub x: f64,
    pub total_synthesis_rate_per_s: f64,
}

impl MetricsData {
    #[must_use]
    pub fn from_sim_data(sim_data: &SimData) -> Self {
        Self {
            molecule_count: sim_data.molecules.len() as u64,
            reaction_count: sim_data.reactions.len() as u64,
            initial_dry_mass_fg: sim_data.initial_dry_mass_fg(),
            doubling_time_s: sim_data.doubling_time_s,
            x: sim_data.x,
            total_synthesis_rate_per_s: sim_data
                .molecules
                .iter()
                .map(|m| m.synthesis_rate_per_s)
                .sum(),
        }
    }
}
