mod common;

use common::{consume, CellBuilder};
use progenitor_core::scheduler::Tier;
use progenitor_core::state::{partition, AllocationPolicy};
use proptest::prelude::*;

#[test]
fn test_oversubscribed_pool_proportional_split() {
    let tiers = vec![Tier::new(
        "expression",
        vec![consume("a", "NTP", 80), consume("b", "NTP", 80)],
    )];
    let mut scheduler = CellBuilder::new()
        .with_bulk("NTP", 100, 1.0)
        .scheduler(tiers, AllocationPolicy::Proportional);
    scheduler.step().unwrap();

    let grants = scheduler.last_grants();
    assert_eq!(grants.len(), 2);
    assert_eq!(grants[0].requester, "a");
    assert_eq!(grants[0].granted, 50);
    assert_eq!(grants[1].requester, "b");
    assert_eq!(grants[1].granted, 50);
    assert_grants_within!(grants, "bulk:NTP", 100);
    assert_bulk!(scheduler.state(), "NTP", 0);
}

#[test]
fn test_oversubscribed_pool_priority_split() {
    let tiers = vec![Tier::new(
        "expression",
        vec![consume("a", "NTP", 80), consume("b", "NTP", 80)],
    )];
    let mut scheduler = CellBuilder::new()
        .with_bulk("NTP", 100, 1.0)
        .scheduler(tiers, AllocationPolicy::Priority);
    scheduler.step().unwrap();

    let grants = scheduler.last_grants();
    assert_eq!(grants[0].granted, 80);
    assert_eq!(grants[1].granted, 20);
    assert_bulk!(scheduler.state(), "NTP", 0);
}

#[test]
fn test_undersubscribed_pool_grants_full_demand() {
    let tiers = vec![Tier::new(
        "expression",
        vec![consume("a", "NTP", 30), consume("b", "NTP", 40)],
    )];
    let mut scheduler = CellBuilder::new()
        .with_bulk("NTP", 100, 1.0)
        .scheduler(tiers, AllocationPolicy::Proportional);
    scheduler.step().unwrap();

    let grants = scheduler.last_grants();
    assert_eq!(grants[0].granted, 30);
    assert_eq!(grants[1].granted, 40);
    assert_bulk!(scheduler.state(), "NTP", 30);
}

#[test]
fn test_rounding_remainder_goes_in_registration_order() {
    // 10 / 3 each: floor gives 3 + 3 + 3, the spare unit goes to the first requester.
    let grants = partition(AllocationPolicy::Proportional, 10, &[10, 10, 10]);
    assert_eq!(grants, vec![4, 3, 3]);
}

#[test]
fn test_empty_pool_grants_nothing() {
    let grants = partition(AllocationPolicy::Proportional, 0, &[5, 7]);
    assert_eq!(grants, vec![0, 0]);
    let grants = partition(AllocationPolicy::Priority, 0, &[5, 7]);
    assert_eq!(grants, vec![0, 0]);
}

#[test]
fn test_zero_demand_requester_gets_zero() {
    let grants = partition(AllocationPolicy::Proportional, 10, &[0, 20]);
    assert_eq!(grants, vec![0, 10]);
}

prop_compose! {
    fn arb_demands()(demands in prop::collection::vec(0u64..1_000, 1..8)) -> Vec<u64> {
        demands
    }
}

fn arb_policy() -> impl Strategy<Value = AllocationPolicy> {
    prop_oneof![
        Just(AllocationPolicy::Proportional),
        Just(AllocationPolicy::Priority)
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_grants_never_exceed_available(
        demands in arb_demands(),
        available in 0u64..2_000,
        policy in arb_policy()
    ) {
        let grants = partition(policy, available, &demands);
        prop_assert_eq!(grants.len(), demands.len());
        prop_assert!(grants.iter().sum::<u64>() <= available);
        for (g, d) in grants.iter().zip(&demands) {
            prop_assert!(g <= d, "grant {} exceeds demand {}", g, d);
        }
    }

    #[test]
    fn test_pool_is_used_up_when_oversubscribed(
        demands in arb_demands(),
        available in 0u64..2_000,
        policy in arb_policy()
    ) {
        let total: u64 = demands.iter().sum();
        let grants = partition(policy, available, &demands);
        let expected = total.min(available);
        prop_assert_eq!(grants.iter().sum::<u64>(), expected);
    }

    #[test]
    fn test_scheduler_conserves_pool(
        a in 0u64..200,
        b in 0u64..200,
        c in 0u64..200,
        pool in 0u64..300,
        policy in arb_policy()
    ) {
        let tiers = vec![Tier::new(
            "t0",
            vec![consume("a", "AA", a), consume("b", "AA", b), consume("c", "AA", c)],
        )];
        let mut scheduler = CellBuilder::new()
            .with_bulk("AA", pool, 1.0)
            .scheduler(tiers, policy);
        scheduler.step().unwrap();
        let granted: u64 = scheduler.last_grants().iter().map(|g| g.granted).sum();
        prop_assert!(granted <= pool);
        prop_assert_eq!(
            progenitor_core::state::StateManager::available(&scheduler.state().bulk, "AA"),
            pool - granted
        );
    }
}
