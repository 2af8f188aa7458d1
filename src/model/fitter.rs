//! Parameter fitting: turns [`RawData`] into [`SimData`] in named stages.
//!
//! Stages run in a fixed order and each one records itself in
//! [`SimData::completed_stages`], so a saved intermediate knows where it
//! came from and a fit can resume after any stage. Per-molecule work is
//! spread over a dedicated rayon pool; collection keeps input order, which
//! makes the result independent of the worker count.

use crate::error::{PipelineError, Result};
use crate::model::knowledge_base::{AA_MASS_FG, AMINO_ACIDS, NTP_MASS_FG, NUCLEOTIDES, RIBOSOME, RNAP};
use progenitor_data::{
    BindingParams, FitOptions, MoleculeClass, MoleculeParams, RawData, ReactionParams, SimData,
};
use rayon::prelude::*;
use std::f64::consts::LN_2;

pub const STAGES: &[&str] = &[
    "initialize",
    "input_adjustments",
    "basal_specs",
    "tf_condition_specs",
    "fit_condition",
    "promoter_binding",
    "final_adjustments",
];

/// Transcription factors of the knowledge base with their binding kinetics.
const TRANSCRIPTION_FACTORS: &[(&str, &str, f64, f64)] = &[
    ("CRP_MONOMER", "crp_bound", 0.01, 0.05),
    ("TRPR_MONOMER", "trpR_bound", 0.02, 0.1),
];

/// Import capacity relative to the steady-state building-block demand.
const IMPORT_HEADROOM: f64 = 1.5;

const TRANSLATION_AA_PER_S: f64 = 16.0;
const TRANSCRIPTION_NT_PER_S: f64 = 40.0;
const VARIABLE_ELONGATION_GAIN: f64 = 1.2;

type Stage = fn(&Fitter<'_>, SimData) -> Result<SimData>;

fn stage_fn(name: &str) -> Option<Stage> {
    let stage: Stage = match name {
        "input_adjustments" => input_adjustments,
        "basal_specs" => basal_specs,
        "tf_condition_specs" => tf_condition_specs,
        "fit_condition" => fit_condition,
        "promoter_binding" => promoter_binding,
        "final_adjustments" => final_adjustments,
        _ => return None,
    };
    Some(stage)
}

pub struct Fitter<'a> {
    raw: &'a RawData,
    options: FitOptions,
    pool: rayon::ThreadPool,
}

impl<'a> Fitter<'a> {
    /// `cpus` sizes the worker pool used for per-molecule stages.
    pub fn new(raw: &'a RawData, options: FitOptions, cpus: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cpus.max(1))
            .thread_name(|i| format!("fit-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::Fit {
                stage: "setup".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { raw, options, pool })
    }

    /// Runs every stage, or the stages after `resume`'s last completed one.
    ///
    /// `on_stage` sees the data after each stage, e.g. to persist
    /// intermediates.
    pub fn fit<F>(&self, resume: Option<SimData>, mut on_stage: F) -> Result<SimData>
    where
        F: FnMut(&str, &SimData) -> Result<()>,
    {
        let (mut sim_data, next) = match resume {
            Some(data) => {
                let last = data.completed_stages.last().cloned().unwrap_or_default();
                let pos = STAGES
                    .iter()
                    .position(|s| *s == last)
                    .ok_or_else(|| PipelineError::Fit {
                        stage: last.clone(),
                        reason: "intermediate does not end in a known stage".to_string(),
                    })?;
                tracing::info!(after = %last, "Resuming fit from intermediate");
                (data, pos + 1)
            }
            None => {
                let data = self.initialize();
                on_stage(STAGES[0], &data)?;
                (data, 1)
            }
        };

        for name in &STAGES[next..] {
            let stage = stage_fn(name).ok_or_else(|| PipelineError::Fit {
                stage: name.to_string(),
                reason: "no such stage".to_string(),
            })?;
            let started = std::time::Instant::now();
            sim_data = stage(self, sim_data)?;
            sim_data.completed_stages.push(name.to_string());
            tracing::debug!(
                stage = %name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fit stage complete"
            );
            on_stage(name, &sim_data)?;
        }
        Ok(sim_data)
    }

    fn initialize(&self) -> SimData {
        let molecules = self
            .raw
            .molecules
            .iter()
            .map(|m| MoleculeParams {
                id: m.id.clone(),
                class: m.class,
                mass_fg: m.mass_fg,
                initial_count: m.initial_count,
                degradation_rate_per_s: 0.0,
                synthesis_rate_per_s: 0.0,
                precursor: match m.class {
                    MoleculeClass::Rna => Some(NUCLEOTIDES.to_string()),
                    MoleculeClass::Protein => Some(AMINO_ACIDS.to_string()),
                    MoleculeClass::Metabolite | MoleculeClass::Complex => None,
                },
                precursor_cost: 0,
            })
            .collect();
        SimData {
            x: 1.0,
            condition: "basal".to_string(),
            doubling_time_s: self.raw.doubling_time_s,
            time_step_s: 1.0,
            molecules,
            reactions: self
                .raw
                .reactions
                .iter()
                .map(|r| ReactionParams {
                    id: r.id.clone(),
                    reactants: r.reactants.clone(),
                    products: r.products.clone(),
                    rate_per_s: r.rate_per_s,
                })
                .collect(),
            bindings: Vec::new(),
            media: self.raw.media.clone(),
            fit_options: self.options.clone(),
            completed_stages: vec![STAGES[0].to_string()],
            applied_variants: Vec::new(),
        }
    }

    fn half_life(&self, id: &str) -> f64 {
        self.raw.molecule(id).map_or(0.0, |m| m.half_life_s)
    }
}

fn precursor_mass(id: &str) -> Option<f64> {
    match id {
        AMINO_ACIDS => Some(AA_MASS_FG),
        NUCLEOTIDES => Some(NTP_MASS_FG),
        _ => None,
    }
}

/// Snaps polymer masses to whole building blocks and complex masses to the
/// sum of their subunits, so no process creates or destroys dry mass.
fn input_adjustments(_fitter: &Fitter<'_>, mut sim_data: SimData) -> Result<SimData> {
    for m in &mut sim_data.molecules {
        let Some(unit) = m.precursor.as_deref().and_then(precursor_mass) else {
            continue;
        };
        let cost = (m.mass_fg / unit).round().max(1.0);
        m.precursor_cost = cost as u32;
        m.mass_fg = cost * unit;
    }

    let reactions = sim_data.reactions.clone();
    for reaction in &reactions {
        let reactant_mass: f64 = reaction
            .reactants
            .iter()
            .map(|t| sim_data.molecule(&t.molecule).map_or(0.0, |m| m.mass_fg) * f64::from(t.coefficient))
            .sum();
        if let [product] = reaction.products.as_slice() {
            if let Some(m) = sim_data.molecule_mut(&product.molecule) {
                m.mass_fg = reactant_mass / f64::from(product.coefficient.max(1));
            }
        }
    }
    Ok(sim_data)
}

/// Degradation from half lives and synthesis that balances decay plus
/// dilution by growth.
fn basal_specs(fitter: &Fitter<'_>, mut sim_data: SimData) -> Result<SimData> {
    let growth = LN_2 / sim_data.doubling_time_s;
    let half_lives: Vec<f64> = sim_data
        .molecules
        .iter()
        .map(|m| fitter.half_life(&m.id))
        .collect();

    let fitted: Vec<(f64, f64)> = fitter.pool.install(|| {
        sim_data
            .molecules
            .par_iter()
            .zip(half_lives.par_iter())
            .map(|(m, &half_life)| {
                let degradation = if half_life > 0.0 { LN_2 / half_life } else { 0.0 };
                let synthesis = if m.precursor.is_some() {
                    m.initial_count as f64 * (growth + degradation)
                } else {
                    0.0
                };
                (degradation, synthesis)
            })
            .collect()
    });
    for (m, (degradation, synthesis)) in sim_data.molecules.iter_mut().zip(fitted) {
        m.degradation_rate_per_s = degradation;
        m.synthesis_rate_per_s = synthesis;
    }

    // Complexes double once per generation; their subunits are made on top.
    for i in 0..sim_data.reactions.len() {
        let rate: f64 = sim_data.reactions[i]
            .products
            .iter()
            .map(|p| sim_data.molecule(&p.molecule).map_or(0.0, |m| m.initial_count as f64) * growth)
            .fold(0.0, f64::max);
        sim_data.reactions[i].rate_per_s = rate;
        let reactants = sim_data.reactions[i].reactants.clone();
        for term in reactants {
            if let Some(m) = sim_data.molecule_mut(&term.molecule) {
                if m.precursor.is_some() {
                    m.synthesis_rate_per_s += rate * f64::from(term.coefficient);
                }
            }
        }
    }
    Ok(sim_data)
}

fn tf_condition_specs(fitter: &Fitter<'_>, mut sim_data: SimData) -> Result<SimData> {
    let limit = if fitter.options.debug { 1 } else { usize::MAX };
    sim_data.bindings = TRANSCRIPTION_FACTORS
        .iter()
        .filter(|(factor, ..)| sim_data.molecule(factor).is_some())
        .take(limit)
        .map(|(factor, bound_kind, binding, unbinding)| BindingParams {
            factor: factor.to_string(),
            bound_kind: bound_kind.to_string(),
            binding_rate_per_s: *binding,
            unbinding_rate_per_s: *unbinding,
        })
        .collect();
    Ok(sim_data)
}

/// Import rates that cover the building-block demand of the condition.
fn fit_condition(_fitter: &Fitter<'_>, mut sim_data: SimData) -> Result<SimData> {
    let growth = LN_2 / sim_data.doubling_time_s;
    let mut demand: std::collections::BTreeMap<String, f64> = std::collections::BTreeMap::new();
    for m in &sim_data.molecules {
        if let Some(precursor) = &m.precursor {
            let cost = f64::from(m.precursor_cost);
            let net = m.synthesis_rate_per_s - m.initial_count as f64 * m.degradation_rate_per_s;
            *demand.entry(precursor.clone()).or_default() += net * cost;
        }
    }
    for (pool, need) in demand.iter_mut() {
        let own = sim_data.molecule(pool).map_or(0.0, |m| m.initial_count as f64);
        *need += own * growth;
    }

    for (pool, need) in &demand {
        let importers = sim_data.media.iter().filter(|c| &c.imported_as == pool).count();
        if importers == 0 {
            return Err(PipelineError::Fit {
                stage: "fit_condition".to_string(),
                reason: format!("medium '{}' supplies no {}", sim_data.condition, pool),
            });
        }
        let share = need.max(0.0) * IMPORT_HEADROOM / importers as f64;
        for component in sim_data.media.iter_mut().filter(|c| &c.imported_as == pool) {
            component.import_rate_per_s = share;
        }
    }
    Ok(sim_data)
}

/// Compensates transcription factors for the copies held at their sites.
fn promoter_binding(_fitter: &Fitter<'_>, mut sim_data: SimData) -> Result<SimData> {
    let bindings = sim_data.bindings.clone();
    for b in bindings {
        if b.unbinding_rate_per_s <= 0.0 {
            continue;
        }
        if let Some(m) = sim_data.molecule_mut(&b.factor) {
            m.synthesis_rate_per_s *= 1.0 + b.binding_rate_per_s / b.unbinding_rate_per_s;
        }
    }
    Ok(sim_data)
}

/// Sizes the ribosome and RNA polymerase pools to the fitted demand.
fn final_adjustments(fitter: &Fitter<'_>, mut sim_data: SimData) -> Result<SimData> {
    let opts = &fitter.options;
    let demand = |class: MoleculeClass| -> f64 {
        sim_data
            .molecules
            .iter()
            .filter(|m| m.class == class)
            .map(|m| m.synthesis_rate_per_s * f64::from(m.precursor_cost))
            .sum()
    };
    let translation = demand(MoleculeClass::Protein);
    let transcription = demand(MoleculeClass::Rna);

    let mut fit_capacity = |id: &str, demand: f64, rate: f64| {
        let required = (demand / rate).ceil() as u64;
        if let Some(m) = sim_data.molecule_mut(id) {
            if m.initial_count < required {
                tracing::debug!(molecule = id, from = m.initial_count, to = required, "Capacity raised");
                m.initial_count = required;
            }
        }
    };

    if !opts.disable_ribosome_capacity_fitting {
        let gain = if opts.variable_elongation_translation {
            VARIABLE_ELONGATION_GAIN
        } else {
            1.0
        };
        fit_capacity(RIBOSOME, translation, TRANSLATION_AA_PER_S * gain);
    }
    if !opts.disable_rnapoly_capacity_fitting {
        let gain = if opts.variable_elongation_transcription {
            VARIABLE_ELONGATION_GAIN
        } else {
            1.0
        };
        fit_capacity(RNAP, transcription, TRANSCRIPTION_NT_PER_S * gain);
    }
    Ok(sim_data)
}
