use serde::{Deserialize, Serialize};

/// A named scalar inside a listener record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub key: String,
    pub value: f64,
}

/// One row of listener output, written once per completed step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListenerRecord {
    pub step: u64,
    pub time_s: f64,
    pub listener: String,
    pub values: Vec<RecordValue>,
}

impl ListenerRecord {
    pub fn new(listener: &str, step: u64, time_s: f64) -> Self {
        Self {
            step,
            time_s,
            listener: listener.to_string(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: f64) {
        self.values.push(RecordValue {
            key: key.into(),
            value,
        });
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.iter().find(|v| v.key == key).map(|v| v.value)
    }
}

/// Requested versus granted amount of one resource for one requester.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    pub step: u64,
    pub tier: usize,
    pub resource: String,
    pub requester: String,
    pub requested: u64,
    pub granted: u64,
}
