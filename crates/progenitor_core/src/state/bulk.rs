use super::{NegativeCount, StateManager};
use progenitor_data::{BulkCount, SimData};
use std::collections::HashMap;

/// Copy numbers of interchangeable molecules, stored column-wise.
///
/// Molecule order is fixed at construction and is the order used by
/// snapshots and by division.
#[derive(Debug, Clone, Default)]
pub struct BulkMolecules {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    counts: Vec<u64>,
    masses_fg: Vec<f64>,
}

impl BulkMolecules {
    #[must_use]
    pub fn from_sim_data(sim_data: &SimData) -> Self {
        let mut bulk = Self::default();
        for m in &sim_data.molecules {
            bulk.insert(&m.id, m.initial_count, m.mass_fg);
        }
        bulk
    }

    /// Adds a species, or overwrites the count of an existing one.
    pub fn insert(&mut self, id: &str, count: u64, mass_fg: f64) {
        if let Some(&i) = self.index.get(id) {
            self.counts[i] = count;
            self.masses_fg[i] = mass_fg;
            return;
        }
        self.index.insert(id.to_string(), self.ids.len());
        self.ids.push(id.to_string());
        self.counts.push(count);
        self.masses_fg.push(mass_fg);
    }

    pub(crate) fn set(&mut self, id: &str, count: u64) {
        match self.index.get(id) {
            Some(&i) => self.counts[i] = count,
            None => self.insert(id, count, 0.0),
        }
    }

    pub(crate) fn zero_all(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn mass_of(&self, id: &str) -> f64 {
        self.index.get(id).map_or(0.0, |&i| self.masses_fg[i])
    }

    #[must_use]
    pub fn mass_fg(&self) -> f64 {
        self.counts
            .iter()
            .zip(&self.masses_fg)
            .map(|(&c, &m)| c as f64 * m)
            .sum()
    }

    /// Same species and masses, counts replaced.
    pub(crate) fn with_counts(&self, counts: Vec<u64>) -> Self {
        Self {
            ids: self.ids.clone(),
            index: self.index.clone(),
            counts,
            masses_fg: self.masses_fg.clone(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<BulkCount> {
        self.ids
            .iter()
            .zip(&self.counts)
            .map(|(id, &count)| BulkCount {
                id: id.clone(),
                count,
            })
            .collect()
    }
}

impl StateManager for BulkMolecules {
    fn partition(&self) -> &'static str {
        "bulk"
    }

    fn available(&self, name: &str) -> u64 {
        self.index.get(name).map_or(0, |&i| self.counts[i])
    }

    fn apply_delta(&mut self, name: &str, delta: i64) -> Result<u64, NegativeCount> {
        let current = self.available(name);
        let next = current as i128 + delta as i128;
        if next < 0 {
            return Err(NegativeCount {
                name: name.to_string(),
                current,
                delta,
            });
        }
        let next = next as u64;
        self.set(name, next);
        Ok(next)
    }

    fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
