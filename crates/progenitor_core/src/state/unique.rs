use progenitor_data::UniqueObject;
use std::collections::BTreeMap;

/// Individually tracked objects keyed by instance id.
///
/// Ids are handed out monotonically and never reused within a lineage.
#[derive(Debug, Clone, Default)]
pub struct UniqueMolecules {
    objects: BTreeMap<u64, UniqueObject>,
    next_id: u64,
}

impl UniqueMolecules {
    #[must_use]
    pub fn from_objects(objects: Vec<UniqueObject>, next_id: u64) -> Self {
        let max_seen = objects.iter().map(|o| o.id + 1).max().unwrap_or(0);
        Self {
            objects: objects.into_iter().map(|o| (o.id, o)).collect(),
            next_id: next_id.max(max_seen),
        }
    }

    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&UniqueObject> {
        self.objects.get(&id)
    }

    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.objects.values().filter(|o| o.kind == kind).count()
    }

    /// Ids of every instance of `kind`, ascending.
    #[must_use]
    pub fn ids_of(&self, kind: &str) -> Vec<u64> {
        self.objects
            .values()
            .filter(|o| o.kind == kind)
            .map(|o| o.id)
            .collect()
    }

    /// Distinct kinds present, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.objects.values().map(|o| o.kind.clone()).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn create(&mut self, kind: &str, mass_fg: f64, step: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(
            id,
            UniqueObject {
                id,
                kind: kind.to_string(),
                mass_fg,
                created_step: step,
            },
        );
        id
    }

    pub fn destroy(&mut self, id: u64) -> Option<UniqueObject> {
        self.objects.remove(&id)
    }

    #[must_use]
    pub fn mass_fg(&self) -> f64 {
        self.objects.values().map(|o| o.mass_fg).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UniqueObject> {
        self.objects.values()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<UniqueObject> {
        self.objects.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_not_reused() {
        let mut unique = UniqueMolecules::default();
        let a = unique.create("bound_tf", 1.0, 0);
        unique.destroy(a);
        let b = unique.create("bound_tf", 1.0, 1);
        assert_ne!(a, b);
        assert_eq!(unique.count("bound_tf"), 1);
    }

    #[test]
    fn test_restore_never_lowers_next_id() {
        let objects = vec![UniqueObject {
            id: 9,
            kind: "x".to_string(),
            mass_fg: 0.0,
            created_step: 0,
        }];
        let unique = UniqueMolecules::from_objects(objects, 2);
        assert_eq!(unique.next_id(), 10);
    }
}
