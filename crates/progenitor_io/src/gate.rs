//! Cancellation of artifact publishing.
//!
//! Every store write ends with a rename that makes the artifact visible.
//! Those renames run under the lock of a [`PublishGate`]; once the gate is
//! closed no further artifact appears, even if the writer keeps running.

use crate::error::{Result, StoreError};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct PublishGate {
    closed: Arc<Mutex<bool>>,
}

impl PublishGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses every later publish. Returns after any rename in flight has
    /// finished.
    pub fn close(&self) {
        let mut closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
        *closed = true;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `publish` unless the gate is closed.
    pub(crate) fn publish<F>(&self, path: &Path, publish: F) -> Result<()>
    where
        F: FnOnce() -> std::io::Result<()>,
    {
        let closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
        if *closed {
            return Err(StoreError::Cancelled(path.display().to_string()));
        }
        publish().map_err(StoreError::from)
    }
}

/// Closes its gate when dropped.
#[derive(Debug)]
pub struct CloseOnDrop(pub PublishGate);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_gate_refuses() {
        let gate = PublishGate::new();
        let mut ran = 0;
        gate.publish(Path::new("a.bin"), || {
            ran += 1;
            Ok(())
        })
        .unwrap();
        gate.clone().close();
        let err = gate
            .publish(Path::new("b.bin"), || {
                ran += 1;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Cancelled(_)));
        assert_eq!(ran, 1);
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let gate = PublishGate::new();
        {
            let _guard = CloseOnDrop(gate.clone());
            assert!(!gate.is_closed());
        }
        assert!(gate.is_closed());
    }
}
