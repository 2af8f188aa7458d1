use super::{NegativeCount, StateManager};
use progenitor_data::{MediaComponent, MediaCount};
use std::collections::BTreeMap;

/// Nutrient pools of the medium surrounding the cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalEnvironment {
    pools: BTreeMap<String, u64>,
}

impl LocalEnvironment {
    #[must_use]
    pub fn from_media(media: &[MediaComponent]) -> Self {
        Self {
            pools: media.iter().map(|m| (m.id.clone(), m.amount)).collect(),
        }
    }

    #[must_use]
    pub fn from_counts(counts: &[MediaCount]) -> Self {
        Self {
            pools: counts.iter().map(|m| (m.id.clone(), m.amount)).collect(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<MediaCount> {
        self.pools
            .iter()
            .map(|(id, &amount)| MediaCount {
                id: id.clone(),
                amount,
            })
            .collect()
    }
}

impl StateManager for LocalEnvironment {
    fn partition(&self) -> &'static str {
        "environment"
    }

    fn available(&self, name: &str) -> u64 {
        self.pools.get(name).copied().unwrap_or(0)
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
        self.pools.insert(name.to_string(), next as u64);
        Ok(next as u64)
    }

    fn total(&self) -> u64 {
        self.pools.values().sum()
    }
}
