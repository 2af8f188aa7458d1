//! Named, indexed transformations of fitted data.
//!
//! Every variant function is pure: it reads the input [`SimData`], returns a
//! modified copy plus its metadata and records itself in the copy's
//! provenance. Index 0 is the unmodified control wherever that makes sense.

use crate::error::ConfigurationError;
use crate::model::knowledge_base::{media_for_condition, CONDITIONS};
use progenitor_data::{AppliedVariant, SimData, VariantMetadata};

type VariantFn = fn(&SimData, u32) -> (VariantMetadata, SimData);

/// Valid indices of a variant function: `0..n`.
#[derive(Clone, Copy)]
enum IndexRange {
    Fixed(u32),
    /// Depends on the data the variant will see.
    PerData(fn(&SimData) -> u32),
}

impl IndexRange {
    fn count(self, sim_data: &SimData) -> u32 {
        match self {
            Self::Fixed(n) => n,
            Self::PerData(count) => count(sim_data),
        }
    }
}

struct VariantEntry {
    name: &'static str,
    range: IndexRange,
    apply: VariantFn,
}

const DOUBLE_X_REPLICATES: u32 = 10;
const TIME_STEPS_S: &[f64] = &[1.0, 0.5, 2.0, 0.25];

static VARIANTS: &[VariantEntry] = &[
    VariantEntry {
        name: "wildtype",
        range: IndexRange::Fixed(1),
        apply: wildtype,
    },
    VariantEntry {
        name: "double_x",
        range: IndexRange::Fixed(DOUBLE_X_REPLICATES),
        apply: double_x,
    },
    VariantEntry {
        name: "condition",
        range: IndexRange::Fixed(CONDITIONS.len() as u32),
        apply: condition,
    },
    VariantEntry {
        name: "gene_knockout",
        range: IndexRange::PerData(|sim_data| 1 + knockout_candidates(sim_data).len() as u32),
        apply: gene_knockout,
    },
    VariantEntry {
        name: "time_step",
        range: IndexRange::Fixed(TIME_STEPS_S.len() as u32),
        apply: time_step,
    },
];

fn out_of_range(function_name: &str, index: u32, count: u32) -> ConfigurationError {
    ConfigurationError::new(format!(
        "variant index {} out of range for '{}' (0..{})",
        index, function_name, count
    ))
}

fn metadata(short_name: &str, description: String) -> VariantMetadata {
    VariantMetadata {
        short_name: short_name.to_string(),
        description,
    }
}

fn wildtype(sim_data: &SimData, _index: u32) -> (VariantMetadata, SimData) {
    (
        metadata("wildtype", "Wild type simulation".to_string()),
        sim_data.clone(),
    )
}

fn double_x(sim_data: &SimData, index: u32) -> (VariantMetadata, SimData) {
    let mut out = sim_data.clone();
    if index == 0 {
        return (metadata("control", "Control: x unchanged".to_string()), out);
    }
    out.x *= 2.0;
    (
        metadata(
            "double_x",
            format!("x doubled to {} (replicate {})", out.x, index),
        ),
        out,
    )
}

fn condition(sim_data: &SimData, index: u32) -> (VariantMetadata, SimData) {
    let mut out = sim_data.clone();
    let name = CONDITIONS[index as usize];
    if let Some((mut media, doubling_time_s)) = media_for_condition(name) {
        // Import capacity scales with the growth rate of the new condition.
        let speedup = sim_data.doubling_time_s / doubling_time_s;
        for component in &mut media {
            let reference: Vec<f64> = sim_data
                .media
                .iter()
                .filter(|c| c.imported_as == component.imported_as)
                .map(|c| c.import_rate_per_s)
                .collect();
            let mean = if reference.is_empty() {
                0.0
            } else {
                reference.iter().sum::<f64>() / reference.len() as f64
            };
            component.import_rate_per_s = mean * speedup;
        }
        out.media = media;
        out.doubling_time_s = doubling_time_s;
    }
    out.condition = name.to_string();
    (
        metadata(name, format!("Growth in {} medium", name)),
        out,
    )
}

/// Synthesised molecules, in data order.
fn knockout_candidates(sim_data: &SimData) -> Vec<&str> {
    sim_data
        .molecules
        .iter()
        .filter(|m| m.synthesis_rate_per_s > 0.0)
        .map(|m| m.id.as_str())
        .collect()
}

fn gene_knockout(sim_data: &SimData, index: u32) -> (VariantMetadata, SimData) {
    let mut out = sim_data.clone();
    if index == 0 {
        return (metadata("control", "Control: no knockout".to_string()), out);
    }
    let target = knockout_candidates(sim_data)
        .get(index as usize - 1)
        .map(|id| id.to_string())
        .unwrap_or_default();
    if let Some(m) = out.molecule_mut(&target) {
        m.synthesis_rate_per_s = 0.0;
        m.initial_count = 0;
    }
    (
        metadata(&format!("{}_KO", target), format!("Knockout of {}", target)),
        out,
    )
}

fn time_step(sim_data: &SimData, index: u32) -> (VariantMetadata, SimData) {
    let mut out = sim_data.clone();
    out.time_step_s = TIME_STEPS_S[index as usize];
    (
        metadata(
            &format!("dt_{}", out.time_step_s),
            format!("Time step of {} s", out.time_step_s),
        ),
        out,
    )
}

/// Names of all variant functions.
pub fn names() -> impl Iterator<Item = &'static str> {
    VARIANTS.iter().map(|v| v.name)
}

/// Number of valid indices of `function_name` for `sim_data`.
pub fn index_count(function_name: &str, sim_data: &SimData) -> Result<u32, ConfigurationError> {
    let entry = lookup(function_name)?;
    Ok(entry.range.count(sim_data))
}

/// Rejects unknown functions and indices outside a data-independent range.
/// Ranges that depend on the data are checked by [`apply_variant`].
pub fn check_index(function_name: &str, index: u32) -> Result<(), ConfigurationError> {
    match lookup(function_name)?.range {
        IndexRange::Fixed(count) if index >= count => Err(out_of_range(function_name, index, count)),
        _ => Ok(()),
    }
}

fn lookup(function_name: &str) -> Result<&'static VariantEntry, ConfigurationError> {
    VARIANTS
        .iter()
        .find(|v| v.name == function_name)
        .ok_or_else(|| {
            ConfigurationError::new(format!(
                "unknown variant function '{}' (known: {:?})",
                function_name,
                names().collect::<Vec<_>>()
            ))
        })
}

/// Applies variant `function_name` number `index` to a copy of `sim_data`.
pub fn apply_variant(
    sim_data: &SimData,
    function_name: &str,
    index: u32,
) -> Result<(VariantMetadata, SimData), ConfigurationError> {
    let entry = lookup(function_name)?;
    let count = entry.range.count(sim_data);
    if index >= count {
        return Err(out_of_range(function_name, index, count));
    }
    let (metadata, mut out) = (entry.apply)(sim_data, index);
    out.applied_variants.push(AppliedVariant {
        function_name: function_name.to_string(),
        index,
    });
    Ok((metadata, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fitter::Fitter;
    use crate::model::knowledge_base::build_raw_data;
    use progenitor_data::{FitOptions, RawDataOptions};

    fn sim_data() -> SimData {
        let raw = build_raw_data(&RawDataOptions::default()).unwrap();
        Fitter::new(&raw, FitOptions::default(), 1)
            .unwrap()
            .fit(None, |_, _| Ok(()))
            .unwrap()
    }

    #[test]
    fn test_double_x_leaves_input_untouched() {
        let input = sim_data();
        let before = input.clone();
        let (meta, out) = apply_variant(&input, "double_x", 2).unwrap();
        assert_eq!(out.x, 2.0 * input.x);
        assert_eq!(input, before);
        assert_eq!(meta.short_name, "double_x");
        assert_eq!(out.applied_variants.len(), 1);
    }

    #[test]
    fn test_control_indices() {
        let input = sim_data();
        let (_, out) = apply_variant(&input, "double_x", 0).unwrap();
        assert_eq!(out.x, input.x);
        let (_, out) = apply_variant(&input, "gene_knockout", 0).unwrap();
        assert_eq!(out.molecules, input.molecules);
    }

    #[test]
    fn test_out_of_range_index() {
        let input = sim_data();
        assert!(apply_variant(&input, "wildtype", 1).is_err());
        assert!(apply_variant(&input, "time_step", 4).is_err());
        let count = index_count("gene_knockout", &input).unwrap();
        assert!(apply_variant(&input, "gene_knockout", count).is_err());
        assert!(apply_variant(&input, "gene_knockout", count - 1).is_ok());
    }

    #[test]
    fn test_unknown_function() {
        assert!(apply_variant(&sim_data(), "triple_x", 0).is_err());
    }

    #[test]
    fn test_condition_switches_medium() {
        let input = sim_data();
        let (meta, out) = apply_variant(&input, "condition", 1).unwrap();
        assert_eq!(out.condition, "with_aa");
        assert_eq!(meta.short_name, "with_aa");
        assert!(out.doubling_time_s < input.doubling_time_s);
        assert!(out.media.iter().any(|m| m.id == "AA[e]" && m.import_rate_per_s > 0.0));
    }

    #[test]
    fn test_knockout_silences_molecule() {
        let input = sim_data();
        let (meta, out) = apply_variant(&input, "gene_knockout", 1).unwrap();
        let target = meta.short_name.trim_end_matches("_KO");
        let m = out.molecule(target).unwrap();
        assert_eq!(m.synthesis_rate_per_s, 0.0);
        assert_eq!(m.initial_count, 0);
    }

    #[test]
    fn test_time_step_variant() {
        let (_, out) = apply_variant(&sim_data(), "time_step", 2).unwrap();
        assert_eq!(out.time_step_s, 2.0);
    }
}
