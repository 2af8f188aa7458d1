//! Two-phase request-then-grant partitioning of shared resources.
//!
//! Within one tier every unit files its [`Request`]s against the state as it
//! stood when the tier started. [`AllocationRound::finalize`] then resolves
//! each resource independently: when demand fits, everyone gets what they
//! asked for; when it does not, the configured [`AllocationPolicy`] scales
//! grants down so that their sum never exceeds the available amount.

use super::{ResourceKey, SimulationState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Over-subscription policy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Each requester gets `floor(demand * available / total_demand)`; the
    /// units lost to rounding go one at a time, in registration order, to
    /// requesters still short of their demand.
    #[default]
    Proportional,
    /// Requesters are served in registration order until the pool is empty.
    Priority,
}

/// Splits `available` among `demands` (listed in registration order).
///
/// The result has one entry per demand, never exceeds the demand, and sums
/// to at most `available`.
#[must_use]
pub fn partition(policy: AllocationPolicy, available: u64, demands: &[u64]) -> Vec<u64> {
    let total: u128 = demands.iter().map(|&d| d as u128).sum();
    if total <= available as u128 {
        return demands.to_vec();
    }

    match policy {
        AllocationPolicy::Priority => {
            let mut remaining = available;
            demands
                .iter()
                .map(|&d| {
                    let g = d.min(remaining);
                    remaining -= g;
                    g
                })
                .collect()
        }
        AllocationPolicy::Proportional => {
            let mut grants: Vec<u64> = demands
                .iter()
                .map(|&d| (d as u128 * available as u128 / total) as u64)
                .collect();
            let mut leftover = available - grants.iter().sum::<u64>();
            while leftover > 0 {
                let mut progressed = false;
                for (g, &d) in grants.iter_mut().zip(demands) {
                    if leftover == 0 {
                        break;
                    }
                    if *g < d {
                        *g += 1;
                        leftover -= 1;
                        progressed = true;
                    }
                }
                if !progressed {
                    break;
                }
            }
            grants
        }
    }
}

/// One unit's demand for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub resource: ResourceKey,
    pub amount: u64,
}

impl Request {
    pub fn new(resource: ResourceKey, amount: u64) -> Self {
        Self { resource, amount }
    }

    pub fn bulk(id: impl Into<String>, amount: u64) -> Self {
        Self::new(ResourceKey::bulk(id), amount)
    }

    pub fn unique(kind: impl Into<String>, amount: u64) -> Self {
        Self::new(ResourceKey::unique(kind), amount)
    }

    pub fn environment(id: impl Into<String>, amount: u64) -> Self {
        Self::new(ResourceKey::environment(id), amount)
    }
}

/// Everything granted to one unit for the current tier pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    bulk: BTreeMap<String, u64>,
    environment: BTreeMap<String, u64>,
    unique: BTreeMap<String, Vec<u64>>,
}

impl Allocation {
    #[must_use]
    pub fn bulk(&self, id: &str) -> u64 {
        self.bulk.get(id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn environment(&self, id: &str) -> u64 {
        self.environment.get(id).copied().unwrap_or(0)
    }

    /// Granted instance ids of `kind`, ascending.
    #[must_use]
    pub fn unique(&self, kind: &str) -> &[u64] {
        self.unique.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn granted(&self, key: &ResourceKey) -> u64 {
        match key {
            ResourceKey::Bulk(n) => self.bulk(n),
            ResourceKey::Environment(n) => self.environment(n),
            ResourceKey::Unique(k) => self.unique(k).len() as u64,
        }
    }

    /// True when nothing at all was granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bulk.values().all(|&g| g == 0)
            && self.environment.values().all(|&g| g == 0)
            && self.unique.values().all(Vec::is_empty)
    }
}

/// Requested versus granted amount for one requester and resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantEntry {
    pub requester: String,
    pub resource: ResourceKey,
    pub requested: u64,
    pub granted: u64,
}

/// Collects the requests of one tier and resolves them.
#[derive(Debug)]
pub struct AllocationRound {
    policy: AllocationPolicy,
    requesters: Vec<String>,
    // resource -> (requester index, summed demand), in registration order
    demands: BTreeMap<ResourceKey, Vec<(usize, u64)>>,
}

impl AllocationRound {
    #[must_use]
    pub fn new(policy: AllocationPolicy) -> Self {
        Self {
            policy,
            requesters: Vec::new(),
            demands: BTreeMap::new(),
        }
    }

    /// Registers a requester; registration order is the tie-break order.
    pub fn register(&mut self, requester: &str) -> usize {
        if let Some(i) = self.requesters.iter().position(|r| r == requester) {
            return i;
        }
        self.requesters.push(requester.to_string());
        self.requesters.len() - 1
    }

    /// Files a demand. Repeated requests for the same resource add up.
    pub fn request(&mut self, requester: usize, request: Request) {
        let entries = self.demands.entry(request.resource).or_default();
        match entries.iter_mut().find(|(r, _)| *r == requester) {
            Some((_, amount)) => *amount = amount.saturating_add(request.amount),
            None => entries.push((requester, request.amount)),
        }
    }

    /// Resolves every resource against `state` (the tier-start state).
    ///
    /// Returns one [`Allocation`] per registered requester, in registration
    /// order, plus the grant log.
    #[must_use]
    pub fn finalize(self, state: &SimulationState) -> (Vec<Allocation>, Vec<GrantEntry>) {
        let mut allocations = vec![Allocation::default(); self.requesters.len()];
        let mut log = Vec::new();

        for (resource, mut entries) in self.demands {
            entries.sort_by_key(|(r, _)| *r);
            let demands: Vec<u64> = entries.iter().map(|(_, d)| *d).collect();
            let available = state.available(&resource);
            let grants = partition(self.policy, available, &demands);

            let mut unique_pool = match &resource {
                ResourceKey::Unique(kind) => state.unique.ids_of(kind).into_iter(),
                _ => Vec::new().into_iter(),
            };

            for ((requester, requested), granted) in entries.into_iter().zip(grants) {
                let allocation = &mut allocations[requester];
                match &resource {
                    ResourceKey::Bulk(n) => {
                        allocation.bulk.insert(n.clone(), granted);
                    }
                    ResourceKey::Environment(n) => {
                        allocation.environment.insert(n.clone(), granted);
                    }
                    ResourceKey::Unique(kind) => {
                        let ids: Vec<u64> = unique_pool.by_ref().take(granted as usize).collect();
                        allocation.unique.insert(kind.clone(), ids);
                    }
                }
                log.push(GrantEntry {
                    requester: self.requesters[requester].clone(),
                    resource: resource.clone(),
                    requested,
                    granted,
                });
            }
        }

        (allocations, log)
    }
}
