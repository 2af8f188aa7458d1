mod common;

use common::{consume, CellBuilder, Convert};
use progenitor_core::process::Process;
use progenitor_core::scheduler::{Phase, Tier, TierDefinition};
use progenitor_core::state::AllocationPolicy;
use progenitor_core::TierRegistry;

#[test]
fn test_later_tier_sees_earlier_tier_output() {
    // Tier 0 turns every precursor into product; tier 1 can only consume
    // product that tier 0 has already merged.
    let tiers = vec![
        Tier::new(
            "conversion",
            vec![Box::new(Convert {
                id: "convert",
                from: "PRE",
                to: "PROD",
                amount: 40,
            }) as Box<dyn Process>],
        ),
        Tier::new("usage", vec![consume("use", "PROD", 100)]),
    ];
    let mut scheduler = CellBuilder::new()
        .with_bulk("PRE", 40, 1.0)
        .with_bulk("PROD", 0, 1.0)
        .scheduler(tiers, AllocationPolicy::Proportional);
    scheduler.step().unwrap();

    let grants = scheduler.last_grants();
    let usage = grants.iter().find(|g| g.requester == "use").unwrap();
    assert_eq!(usage.tier, 1);
    assert_eq!(usage.requested, 100);
    assert_eq!(usage.granted, 40);
    assert_bulk!(scheduler.state(), "PRE", 0);
    assert_bulk!(scheduler.state(), "PROD", 0);
}

#[test]
fn test_same_tier_units_share_tier_start_state() {
    // Both units see the same 40 copies of PROD; the converter's output
    // only becomes visible to the next tier.
    let tiers = vec![Tier::new(
        "mixed",
        vec![
            Box::new(Convert {
                id: "convert",
                from: "PRE",
                to: "PROD",
                amount: 10,
            }) as Box<dyn Process>,
            consume("use", "PROD", 100),
        ],
    )];
    let mut scheduler = CellBuilder::new()
        .with_bulk("PRE", 10, 1.0)
        .with_bulk("PROD", 40, 1.0)
        .scheduler(tiers, AllocationPolicy::Proportional);
    scheduler.step().unwrap();

    let usage = scheduler
        .last_grants()
        .iter()
        .find(|g| g.requester == "use")
        .unwrap()
        .clone();
    assert_eq!(usage.granted, 40);
    assert_bulk!(scheduler.state(), "PROD", 10);
}

#[test]
fn test_tiers_keep_declaration_order() {
    let tiers = vec![
        Tier::new("first", vec![consume("a", "X", 1)]),
        Tier::new("second", vec![consume("b", "X", 1)]),
        Tier::new("third", vec![consume("c", "X", 1)]),
    ];
    let mut scheduler = CellBuilder::new()
        .with_bulk("X", 2, 1.0)
        .scheduler(tiers, AllocationPolicy::Proportional);
    assert_eq!(scheduler.tier_names(), vec!["first", "second", "third"]);
    scheduler.step().unwrap();

    let tiers_seen: Vec<usize> = scheduler.last_grants().iter().map(|g| g.tier).collect();
    assert_eq!(tiers_seen, vec![0, 1, 2]);
    let granted: Vec<u64> = scheduler.last_grants().iter().map(|g| g.granted).collect();
    assert_eq!(granted, vec![1, 1, 0]);
    assert_eq!(scheduler.phase(), Phase::StepComplete);
}

#[test]
fn test_standard_tier_order() {
    let registry = TierRegistry::standard();
    let names: Vec<&str> = registry.tiers().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["unbinding", "equilibrium", "binding", "expression", "exchange"]
    );
    assert!(registry.tier_of("tf_unbinding") < registry.tier_of("tf_binding"));
    assert_eq!(registry.tier_of("synthesis"), registry.tier_of("degradation"));
}

#[test]
fn test_unit_in_two_tiers_rejected() {
    let result = TierRegistry::new(vec![
        TierDefinition::new("a", &["synthesis"]),
        TierDefinition::new("b", &["synthesis"]),
    ]);
    assert!(result.is_err());
    assert!(TierRegistry::new(vec![TierDefinition::new("empty", &[])]).is_err());
    assert!(TierRegistry::new(Vec::new()).is_err());
}
