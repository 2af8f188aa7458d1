//! Read-only observers run after every completed tier pass.
//!
//! Listeners see the state after the last tier merged and the grants logged
//! during the step. They cannot allocate or mutate; each produces exactly one
//! [`ListenerRecord`] per step. A listener that carries state between steps
//! updates it in [`Listener::commit`], which only runs once the step and its
//! records have been committed.

use crate::state::SimulationState;
use progenitor_data::{GrantRecord, ListenerRecord};
use std::collections::BTreeMap;

pub trait Listener: Send {
    fn name(&self) -> &str;

    fn observe(&self, state: &SimulationState, grants: &[GrantRecord]) -> ListenerRecord;

    /// Called with the committed state after every successful step.
    fn commit(&mut self, _state: &SimulationState) {}
}

/// Destination for listener rows, e.g. a record file.
pub trait RecordSink: Send {
    fn write_record(&mut self, record: &ListenerRecord) -> std::io::Result<()>;

    /// Flushes and publishes whatever was written.
    fn close(self: Box<Self>) -> std::io::Result<()> {
        Ok(())
    }
}

/// In-memory append-only record log keyed by step.
#[derive(Debug, Default, Clone)]
pub struct ListenerLog {
    records: Vec<ListenerRecord>,
}

impl ListenerLog {
    pub(crate) fn append(&mut self, records: Vec<ListenerRecord>) {
        self.records.extend(records);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[ListenerRecord] {
        &self.records
    }

    /// Rows of one listener, in step order.
    pub fn for_listener<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ListenerRecord> + 'a {
        self.records.iter().filter(move |r| r.listener == name)
    }

    #[must_use]
    pub fn last_step(&self) -> Option<u64> {
        self.records.last().map(|r| r.step)
    }
}

/// Dry mass and its fold change relative to the first observed step.
#[derive(Debug, Default)]
pub struct MassListener {
    initial_mass_fg: Option<f64>,
}

impl MassListener {
    pub const NAME: &'static str = "mass";

    /// Fold change is measured against `initial_mass_fg`.
    #[must_use]
    pub fn with_initial_mass(initial_mass_fg: f64) -> Self {
        Self {
            initial_mass_fg: Some(initial_mass_fg),
        }
    }
}

impl Listener for MassListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn observe(&self, state: &SimulationState, _grants: &[GrantRecord]) -> ListenerRecord {
        let mass = state.dry_mass_fg();
        let initial = self.initial_mass_fg.unwrap_or(mass);
        let mut record = ListenerRecord::new(Self::NAME, state.step, state.time_s);
        record.push("dry_mass_fg", mass);
        record.push("bulk_mass_fg", state.bulk.mass_fg());
        record.push("unique_mass_fg", state.unique.mass_fg());
        record.push(
            "fold_change",
            if initial > 0.0 { mass / initial } else { 1.0 },
        );
        record
    }

    fn commit(&mut self, state: &SimulationState) {
        self.initial_mass_fg.get_or_insert_with(|| state.dry_mass_fg());
    }
}

/// Requested versus granted totals, per requester and overall.
#[derive(Debug, Default)]
pub struct AllocationListener;

impl AllocationListener {
    pub const NAME: &'static str = "allocation";
}

impl Listener for AllocationListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn observe(&self, state: &SimulationState, grants: &[GrantRecord]) -> ListenerRecord {
        let mut per_requester: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        let mut short = 0u64;
        for g in grants {
            let entry = per_requester.entry(g.requester.as_str()).or_default();
            entry.0 += g.requested;
            entry.1 += g.granted;
            if g.granted < g.requested {
                short += 1;
            }
        }

        let mut record = ListenerRecord::new(Self::NAME, state.step, state.time_s);
        record.push(
            "requested",
            per_requester.values().map(|v| v.0).sum::<u64>() as f64,
        );
        record.push(
            "granted",
            per_requester.values().map(|v| v.1).sum::<u64>() as f64,
        );
        record.push("short_grants", short as f64);
        for (requester, (requested, granted)) in per_requester {
            record.push(format!("{}.requested", requester), requested as f64);
            record.push(format!("{}.granted", requester), granted as f64);
        }
        record
    }
}

/// Instance counts of every unique-object kind.
#[derive(Debug, Default)]
pub struct UniqueCountListener;

impl UniqueCountListener {
    pub const NAME: &'static str = "unique_counts";
}

impl Listener for UniqueCountListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn observe(&self, state: &SimulationState, _grants: &[GrantRecord]) -> ListenerRecord {
        let mut record = ListenerRecord::new(Self::NAME, state.step, state.time_s);
        record.push("total", state.unique.len() as f64);
        for kind in state.unique.kinds() {
            let count = state.unique.count(&kind) as f64;
            record.push(kind, count);
        }
        record
    }
}
