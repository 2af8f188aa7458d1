//! The built-in reference knowledge base.
//!
//! A small, self-consistent cell: two building-block pools, a handful of
//! coding genes, two rRNA operons and the complexes built from them. Raw
//! data options reshape it deterministically; the same options always give
//! the same [`RawData`].

use crate::error::ConfigurationError;
use progenitor_data::{
    Gene, MediaComponent, Molecule, MoleculeClass, RawData, RawDataOptions, Reaction, StoichTerm,
};

pub const AMINO_ACIDS: &str = "AA";
pub const NUCLEOTIDES: &str = "NTP";
pub const AA_MASS_FG: f64 = 0.0002;
pub const NTP_MASS_FG: f64 = 0.0005;

/// Media conditions known to the knowledge base, the first being the
/// reference condition.
pub const CONDITIONS: &[&str] = &["basal", "with_aa", "acetate"];

pub const OPERONS: &[&str] = &["off", "on"];
pub const NEW_GENE_SETS: &[&str] = &["off", "gfp"];
pub const PROTEIN_DEGRADATION_COMBOS: &[&str] = &["default", "fast", "stable"];

const MEDIA_AMOUNT: u64 = 1_000_000_000_000;

const MRNA_HALF_LIFE_S: f64 = 300.0;
const RRNA_HALF_LIFE_S: f64 = 20_000.0;
const PROTEIN_HALF_LIFE_S: f64 = 36_000.0;

const MRNA_MASS_FG: f64 = 0.5;
const RRNA_MASS_FG: f64 = 0.8;
const PROTEIN_MASS_FG: f64 = 0.05;

struct GeneSpec {
    id: &'static str,
    monomer: Option<&'static str>,
    expression: f64,
    is_rrna: bool,
}

const fn coding(id: &'static str, monomer: &'static str, expression: f64) -> GeneSpec {
    GeneSpec {
        id,
        monomer: Some(monomer),
        expression,
        is_rrna: false,
    }
}

const fn rrna(id: &'static str, expression: f64) -> GeneSpec {
    GeneSpec {
        id,
        monomer: None,
        expression,
        is_rrna: true,
    }
}

const GENES: &[GeneSpec] = &[
    coding("rpoA", "RPOA_MONOMER", 3.0),
    coding("rplB", "RPLB_MONOMER", 5.0),
    coding("lacZ", "LACZ_MONOMER", 0.5),
    coding("crp", "CRP_MONOMER", 1.0),
    coding("trpR", "TRPR_MONOMER", 0.5),
    coding("ompF", "OMPF_MONOMER", 2.0),
    rrna("rrsA", 8.0),
    rrna("rrlA", 8.0),
    rrna("rrsB", 6.0),
    rrna("rrlB", 6.0),
    rrna("rrfF", 2.0),
];

/// Co-transcribed gene groups. Operons listed in [`RRNA_OPERONS_REMOVABLE`]
/// disappear with `remove_rrna_operons`.
const OPERON_GROUPS: &[&[&str]] = &[&["rplB", "rpoA"], &["rrsA", "rrlA"], &["rrsB", "rrlB", "rrfF"]];
const RRNA_OPERONS_REMOVABLE: &[&str] = &["rrsB", "rrlB"];

const GFP: GeneSpec = coding("gfp", "GFP_MONOMER", 1.0);

pub const RNAP: &str = "RNAP";
pub const RIBOSOME: &str = "RIBOSOME";

/// Rejects option values the knowledge base does not know.
pub fn validate_options(options: &RawDataOptions) -> Result<(), ConfigurationError> {
    let check = |name: &str, value: &str, allowed: &[&str]| {
        if allowed.contains(&value) {
            Ok(())
        } else {
            Err(ConfigurationError::new(format!(
                "{} must be one of {:?}, got '{}'",
                name, allowed, value
            )))
        }
    };
    check("operons", &options.operons, OPERONS)?;
    check("new_genes", &options.new_genes, NEW_GENE_SETS)?;
    check(
        "protein_degradation_combo",
        &options.protein_degradation_combo,
        PROTEIN_DEGRADATION_COMBOS,
    )
}

/// Growth medium and expected doubling time of a condition.
#[must_use]
pub fn media_for_condition(condition: &str) -> Option<(Vec<MediaComponent>, f64)> {
    let component = |id: &str, imported_as: &str| MediaComponent {
        id: id.to_string(),
        amount: MEDIA_AMOUNT,
        imported_as: imported_as.to_string(),
        import_rate_per_s: 0.0,
    };
    match condition {
        "basal" => Some((
            vec![component("GLC[e]", AMINO_ACIDS), component("BASE[e]", NUCLEOTIDES)],
            3000.0,
        )),
        "with_aa" => Some((
            vec![
                component("GLC[e]", AMINO_ACIDS),
                component("BASE[e]", NUCLEOTIDES),
                component("AA[e]", AMINO_ACIDS),
            ],
            1800.0,
        )),
        "acetate" => Some((
            vec![component("ACET[e]", AMINO_ACIDS), component("BASE[e]", NUCLEOTIDES)],
            6000.0,
        )),
        _ => None,
    }
}

fn rna_id(gene: &str) -> String {
    format!("{}_RNA", gene)
}

fn protein_half_life(combo: &str) -> f64 {
    match combo {
        "fast" => PROTEIN_HALF_LIFE_S / 2.0,
        "stable" => 0.0,
        _ => PROTEIN_HALF_LIFE_S,
    }
}

/// Builds the reference knowledge base shaped by `options`.
pub fn build_raw_data(options: &RawDataOptions) -> Result<RawData, ConfigurationError> {
    validate_options(options)?;

    let mut genes: Vec<Gene> = GENES
        .iter()
        .chain((options.new_genes == "gfp").then_some(&GFP))
        .filter(|g| !(options.remove_rrna_operons && RRNA_OPERONS_REMOVABLE.contains(&g.id)))
        .filter(|g| !(options.remove_rrff && g.id == "rrfF"))
        .map(|g| Gene {
            id: g.id.to_string(),
            rna_id: rna_id(g.id),
            monomer_id: g.monomer.map(str::to_string),
            expression: g.expression,
            is_rrna: g.is_rrna,
        })
        .collect();

    if options.operons == "on" {
        for group in OPERON_GROUPS {
            let members: Vec<f64> = genes
                .iter()
                .filter(|g| group.contains(&g.id.as_str()))
                .map(|g| g.expression)
                .collect();
            if members.is_empty() {
                continue;
            }
            let mean = members.iter().sum::<f64>() / members.len() as f64;
            for gene in genes.iter_mut().filter(|g| group.contains(&g.id.as_str())) {
                gene.expression = mean;
            }
        }
    }

    let mut molecules = vec![
        Molecule {
            id: AMINO_ACIDS.to_string(),
            class: MoleculeClass::Metabolite,
            mass_fg: AA_MASS_FG,
            initial_count: 200_000,
            half_life_s: 0.0,
        },
        Molecule {
            id: NUCLEOTIDES.to_string(),
            class: MoleculeClass::Metabolite,
            mass_fg: NTP_MASS_FG,
            initial_count: 100_000,
            half_life_s: 0.0,
        },
    ];

    let rrna_half_life = if options.stable_rrna { 0.0 } else { RRNA_HALF_LIFE_S };
    for gene in &genes {
        let (mass_fg, copies, half_life_s) = if gene.is_rrna {
            (RRNA_MASS_FG, 40.0, rrna_half_life)
        } else {
            (MRNA_MASS_FG, 4.0, MRNA_HALF_LIFE_S)
        };
        molecules.push(Molecule {
            id: gene.rna_id.clone(),
            class: MoleculeClass::Rna,
            mass_fg,
            initial_count: (gene.expression * copies).round() as u64,
            half_life_s,
        });
        if let Some(monomer) = &gene.monomer_id {
            molecules.push(Molecule {
                id: monomer.clone(),
                class: MoleculeClass::Protein,
                mass_fg: PROTEIN_MASS_FG,
                initial_count: (gene.expression * 200.0).round() as u64,
                half_life_s: protein_half_life(&options.protein_degradation_combo),
            });
        }
    }

    molecules.push(Molecule {
        id: RNAP.to_string(),
        class: MoleculeClass::Complex,
        mass_fg: 2.0 * PROTEIN_MASS_FG,
        initial_count: 50,
        half_life_s: 0.0,
    });
    molecules.push(Molecule {
        id: RIBOSOME.to_string(),
        class: MoleculeClass::Complex,
        mass_fg: PROTEIN_MASS_FG + 2.0 * RRNA_MASS_FG,
        initial_count: 100,
        half_life_s: 0.0,
    });

    let reactions = vec![
        Reaction {
            id: "RNAP_assembly".to_string(),
            reactants: vec![StoichTerm::new("RPOA_MONOMER", 2)],
            products: vec![StoichTerm::new(RNAP, 1)],
            rate_per_s: 0.5,
        },
        Reaction {
            id: "ribosome_assembly".to_string(),
            reactants: vec![
                StoichTerm::new("RPLB_MONOMER", 1),
                StoichTerm::new(&rna_id("rrsA"), 1),
                StoichTerm::new(&rna_id("rrlA"), 1),
            ],
            products: vec![StoichTerm::new(RIBOSOME, 1)],
            rate_per_s: 1.0,
        },
    ];

    let (media, doubling_time_s) = media_for_condition(CONDITIONS[0])
        .ok_or_else(|| ConfigurationError::new("reference condition has no medium"))?;

    Ok(RawData {
        options: options.clone(),
        genes,
        molecules,
        reactions,
        media,
        doubling_time_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_knowledge_base() {
        let raw = build_raw_data(&RawDataOptions::default()).unwrap();
        assert_eq!(raw.genes.len(), GENES.len());
        assert!(raw.molecule("RIBOSOME").is_some());
        assert!(raw.molecule("rrfF_RNA").is_some());
        assert!(raw.initial_dry_mass_fg() > 0.0);
        assert_eq!(raw.doubling_time_s, 3000.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let options = RawDataOptions {
            operons: "on".to_string(),
            new_genes: "gfp".to_string(),
            ..RawDataOptions::default()
        };
        assert_eq!(build_raw_data(&options).unwrap(), build_raw_data(&options).unwrap());
    }

    #[test]
    fn test_options_reshape_knowledge_base() {
        let options = RawDataOptions {
            remove_rrna_operons: true,
            remove_rrff: true,
            stable_rrna: true,
            new_genes: "gfp".to_string(),
            protein_degradation_combo: "stable".to_string(),
            ..RawDataOptions::default()
        };
        let raw = build_raw_data(&options).unwrap();
        assert!(raw.gene("rrsB").is_none());
        assert!(raw.gene("rrfF").is_none());
        assert!(raw.gene("rrsA").is_some());
        assert!(raw.molecule("GFP_MONOMER").is_some());
        assert_eq!(raw.molecule("rrsA_RNA").unwrap().half_life_s, 0.0);
        assert_eq!(raw.molecule("LACZ_MONOMER").unwrap().half_life_s, 0.0);
    }

    #[test]
    fn test_operons_share_expression() {
        let options = RawDataOptions {
            operons: "on".to_string(),
            ..RawDataOptions::default()
        };
        let raw = build_raw_data(&options).unwrap();
        assert_eq!(
            raw.gene("rplB").unwrap().expression,
            raw.gene("rpoA").unwrap().expression
        );
    }

    #[test]
    fn test_unknown_option_rejected() {
        let options = RawDataOptions {
            new_genes: "luciferase".to_string(),
            ..RawDataOptions::default()
        };
        assert!(build_raw_data(&options).is_err());
    }

    #[test]
    fn test_every_condition_has_medium() {
        for condition in CONDITIONS {
            assert!(media_for_condition(condition).is_some());
        }
        assert!(media_for_condition("anaerobic").is_none());
    }
}
