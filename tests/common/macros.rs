/// Asserts that a bulk molecule holds exactly the given count.
#[macro_export]
macro_rules! assert_bulk {
    ($state:expr, $id:expr, $count:expr) => {
        assert_eq!(
            progenitor_core::state::StateManager::available(&$state.bulk, $id),
            $count,
            "Bulk count of {} mismatch",
            $id
        );
    };
}

/// Asserts that the grants of one resource never exceed what was available.
#[macro_export]
macro_rules! assert_grants_within {
    ($grants:expr, $resource:expr, $available:expr) => {
        let granted: u64 = $grants
            .iter()
            .filter(|g| g.resource == $resource)
            .map(|g| g.granted)
            .sum();
        assert!(
            granted <= $available,
            "Granted {} of {} but only {} available",
            granted,
            $resource,
            $available
        );
    };
}
