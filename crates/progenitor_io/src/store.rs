//! Path-addressed artifact store.
//!
//! Every write lands in a temporary sibling file first and is renamed into
//! place, so a reader either sees the previous artifact or the complete new
//! one, never a partial write.

use crate::envelope::{self, Artifact, DepthBudget};
use crate::error::{Result, StoreError};
use crate::gate::PublishGate;
use crate::records::RecordWriter;
use chrono::{DateTime, Local};
use rkyv::de::deserializers::SharedDeserializeMap;
use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{Archive, CheckBytes};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), n))
}

/// Writes `bytes` to `path` through a temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], gate: &PublishGate) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = tmp_path_for(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(e) = gate.publish(path, || std::fs::rename(&tmp_path, path)) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// Typed binary objects addressed by path.
///
/// Relative paths resolve against the store root; absolute paths are used
/// as given.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    depth_limit: usize,
    gate: PublishGate,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            depth_limit: DepthBudget::DEFAULT_LIMIT,
            gate: PublishGate::new(),
        }
    }

    #[must_use]
    pub fn with_depth_limit(mut self, limit: usize) -> Self {
        self.depth_limit = limit;
        self
    }

    /// Publishes through `gate` from now on; closing it stops this store
    /// and its clones from making new artifacts visible.
    #[must_use]
    pub fn with_gate(mut self, gate: PublishGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate(&self) -> &PublishGate {
        &self.gate
    }

    /// Record file under `path`, published through this store's gate.
    pub fn record_writer<P: AsRef<Path>>(&self, path: P) -> Result<RecordWriter> {
        RecordWriter::create_gated(self.resolve(path), self.gate.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve(path).is_file()
    }

    pub fn create_dir_all<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let full = self.resolve(path);
        std::fs::create_dir_all(&full)
            .map_err(|e| StoreError::from(e).with_context(format!("creating {:?}", full)))?;
        Ok(full)
    }

    /// Serializes and atomically publishes `value`.
    ///
    /// A depth overflow is retried once with a raised budget.
    pub fn save<T, P>(&self, path: P, value: &T) -> Result<()>
    where
        T: Artifact + rkyv::Serialize<AllocSerializer<4096>>,
        P: AsRef<Path>,
    {
        let full = self.resolve(path);
        let mut budget = DepthBudget::new(self.depth_limit);
        let bytes = match envelope::encode(value, &budget) {
            Err(StoreError::DepthExceeded { depth, budget: limit }) if budget.raise() => {
                tracing::warn!(
                    kind = T::KIND,
                    depth,
                    from = limit,
                    to = budget.limit(),
                    "Serialization depth budget exceeded, raising once"
                );
                envelope::encode(value, &budget)
            }
            other => other,
        }
        .map_err(|e| e.with_context(format!("saving {} to {:?}", T::KIND, full)))?;

        write_atomic(&full, &bytes, &self.gate)
            .map_err(|e| e.with_context(format!("saving {} to {:?}", T::KIND, full)))?;
        tracing::debug!(kind = T::KIND, path = ?full, bytes = bytes.len(), "Artifact saved");
        Ok(())
    }

    pub fn load<T, P>(&self, path: P) -> Result<T>
    where
        T: Artifact + Archive,
        T::Archived: rkyv::Deserialize<T, SharedDeserializeMap>
            + for<'a> CheckBytes<DefaultValidator<'a>>,
        P: AsRef<Path>,
    {
        let full = self.resolve(path);
        let bytes = self.read_bytes(&full)?;
        envelope::decode(&bytes)
            .map_err(|e| e.with_context(format!("loading {} from {:?}", T::KIND, full)))
    }

    /// Copies a stored artifact to another path after checking its framing.
    pub fn copy<P: AsRef<Path>, Q: AsRef<Path>>(&self, from: P, to: Q) -> Result<()> {
        let src = self.resolve(from);
        let dst = self.resolve(to);
        let bytes = self.read_bytes(&src)?;
        envelope::verify(&bytes)
            .map_err(|e| e.with_context(format!("copying {:?}", src)))?;
        write_atomic(&dst, &bytes, &self.gate)
            .map_err(|e| e.with_context(format!("copying {:?} to {:?}", src, dst)))
    }

    pub fn write_text<P: AsRef<Path>>(&self, path: P, text: &str) -> Result<()> {
        let full = self.resolve(path);
        write_atomic(&full, text.as_bytes(), &self.gate)
            .map_err(|e| e.with_context(format!("writing {:?}", full)))
    }

    pub fn read_text<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let full = self.resolve(path);
        let bytes = self.read_bytes(&full)?;
        String::from_utf8(bytes).map_err(|_| StoreError::corrupt(format!("{:?} is not UTF-8", full)))
    }

    /// Last modification time of an artifact.
    pub fn modified<P: AsRef<Path>>(&self, path: P) -> Result<DateTime<Local>> {
        let full = self.resolve(path);
        let meta = std::fs::metadata(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::not_found(full.display().to_string())
            } else {
                StoreError::from(e).with_context(format!("reading metadata of {:?}", full))
            }
        })?;
        Ok(DateTime::<Local>::from(meta.modified()?))
    }

    fn read_bytes(&self, full: &Path) -> Result<Vec<u8>> {
        std::fs::read(full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::not_found(full.display().to_string())
            } else {
                StoreError::from(e).with_context(format!("reading {:?}", full))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progenitor_data::MetricsData;

    fn metrics() -> MetricsData {
        MetricsData {
            molecule_count: 2,
            reaction_count: 0,
            initial_dry_mass_fg: 12.5,
            doubling_time_s: 3000.0,
            x: 2.0,
            total_synthesis_rate_per_s: 0.1,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save("kb/metrics.bin", &metrics()).unwrap();
        assert!(store.exists("kb/metrics.bin"));
        let loaded: MetricsData = store.load("kb/metrics.bin").unwrap();
        assert_eq!(loaded, metrics());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save("metrics.bin", &metrics()).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["metrics.bin".to_string()]);
    }

    #[test]
    fn test_closed_gate_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let gate = PublishGate::new();
        let store = ArtifactStore::new(dir.path()).with_gate(gate.clone());
        store.save("before.bin", &metrics()).unwrap();
        let mut records = store.record_writer("rows.jsonl.gz").unwrap();
        records.append(&metrics().x).unwrap();

        gate.close();
        let err = store.save("after.bin", &metrics()).unwrap_err();
        assert!(matches!(err.root(), StoreError::Cancelled(_)), "{}", err);
        assert!(store.write_text("after.txt", "late").is_err());
        assert!(records.finish().is_err());

        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["before.bin".to_string()]);
        assert!(ArtifactStore::new(dir.path()).save("after.bin", &metrics()).is_ok());
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.load::<MetricsData, _>("absent.bin").unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_copy_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_text("garbage.bin", "not an artifact").unwrap();
        let err = store.copy("garbage.bin", "out.bin").unwrap_err();
        assert!(err.is_corrupt());
        assert!(!store.exists("out.bin"));
    }

    #[test]
    fn test_depth_overflow_is_retried_once() {
        let dir = tempfile::tempdir().unwrap();
        // Metrics report depth 1, so a zero budget forces the raise.
        let store = ArtifactStore::new(dir.path()).with_depth_limit(0);
        store.save("metrics.bin", &metrics()).unwrap();
        assert!(store.exists("metrics.bin"));
    }

    #[test]
    fn test_modified_time_available() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_text("note.txt", "hello\n").unwrap();
        assert!(store.modified("note.txt").is_ok());
        assert_eq!(store.read_text("note.txt").unwrap(), "hello\n");
    }
}
