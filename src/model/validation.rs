//! Experimental reference data and its reduction against a knowledge base.

use progenitor_data::{RawData, RawValidationData, ReferenceMeasurement, ValidationData, ValidationTarget};
use std::collections::BTreeMap;

const DATASETS: &[(&str, &[(&str, f64)])] = &[
    (
        "proteomics_basal",
        &[
            ("RPOA_MONOMER", 640.0),
            ("RPLB_MONOMER", 980.0),
            ("LACZ_MONOMER", 85.0),
            ("CRP_MONOMER", 210.0),
            ("OMPF_MONOMER", 430.0),
            ("ACRB_MONOMER", 120.0),
        ],
    ),
    (
        "proteomics_replicate",
        &[
            ("RPOA_MONOMER", 580.0),
            ("RPLB_MONOMER", 1020.0),
            ("TRPR_MONOMER", 95.0),
            ("OMPF_MONOMER", 390.0),
        ],
    ),
    (
        "rna_counts",
        &[("rrsA_RNA", 310.0), ("rrlA_RNA", 305.0), ("ompF_RNA", 9.0)],
    ),
];

const OBSERVED_DOUBLING_TIME_S: f64 = 2940.0;

/// Bundles the built-in reference datasets.
#[must_use]
pub fn build_raw_validation_data() -> RawValidationData {
    let measurements = DATASETS
        .iter()
        .flat_map(|(dataset, values)| {
            values.iter().map(move |(molecule, copies)| ReferenceMeasurement {
                dataset: dataset.to_string(),
                molecule: molecule.to_string(),
                copies_per_cell: *copies,
            })
        })
        .collect();
    RawValidationData {
        measurements,
        doubling_time_s: OBSERVED_DOUBLING_TIME_S,
    }
}

/// Averages replicate measurements of every known molecule.
///
/// Molecules missing from `raw_data` are listed in
/// [`ValidationData::unmatched`] instead of becoming targets.
#[must_use]
pub fn process_validation_data(raw_validation: &RawValidationData, raw_data: &RawData) -> ValidationData {
    let mut sums: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
    let mut unmatched = Vec::new();
    for m in &raw_validation.measurements {
        if raw_data.molecule(&m.molecule).is_some() {
            let entry = sums.entry(m.molecule.as_str()).or_default();
            entry.0 += m.copies_per_cell;
            entry.1 += 1;
        } else {
            unmatched.push(m.molecule.clone());
        }
    }
    unmatched.sort();
    unmatched.dedup();

    let means: Vec<(&str, f64, f64)> = sums
        .into_iter()
        .map(|(id, (sum, n))| {
            let mean = sum / f64::from(n);
            let mass = raw_data.molecule(id).map_or(0.0, |m| m.mass_fg);
            (id, mean, mean * mass)
        })
        .collect();
    let total_mass: f64 = means.iter().map(|(_, _, mass)| mass).sum();

    ValidationData {
        targets: means
            .into_iter()
            .map(|(id, mean, mass)| ValidationTarget {
                molecule: id.to_string(),
                expected_count: mean,
                mass_fraction: if total_mass > 0.0 { mass / total_mass } else { 0.0 },
            })
            .collect(),
        expected_doubling_time_s: raw_validation.doubling_time_s,
        unmatched,
    }
}
