//! Listener record files: gzip-compressed JSON lines.
//!
//! A [`RecordWriter`] streams rows into a hidden temporary file and only
//! publishes it under the final name in [`RecordWriter::finish`]. Dropping an
//! unfinished writer discards the partial file.

use crate::error::{Result, StoreError};
use crate::gate::PublishGate;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use progenitor_core::listener::RecordSink;
use progenitor_data::ListenerRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct RecordWriter {
    path: PathBuf,
    tmp_path: PathBuf,
    encoder: Option<GzEncoder<BufWriter<File>>>,
    rows: u64,
    gate: PublishGate,
}

impl RecordWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_gated(path, PublishGate::new())
    }

    /// Like [`RecordWriter::create`], but [`RecordWriter::finish`] publishes
    /// only while `gate` is open.
    pub fn create_gated<P: AsRef<Path>>(path: P, gate: PublishGate) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::validation(format!("{:?} has no file name", path)))?;
        let tmp_path = path.with_file_name(format!(
            ".{}.{}.{}.partial",
            name,
            std::process::id(),
            PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let file = File::create(&tmp_path)
            .map_err(|e| StoreError::from(e).with_context(format!("creating {:?}", tmp_path)))?;
        Ok(Self {
            path,
            tmp_path,
            encoder: Some(GzEncoder::new(BufWriter::new(file), Compression::default())),
            rows: 0,
            gate,
        })
    }

    pub fn append<T: Serialize>(&mut self, row: &T) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| StoreError::validation("record writer already finished"))?;
        let json = serde_json::to_string(row)?;
        writeln!(encoder, "{}", json)?;
        self.rows += 1;
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the stream and publishes the file under its final name.
    pub fn finish(mut self) -> Result<PathBuf> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| StoreError::validation("record writer already finished"))?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        drop(writer);
        if let Err(e) = self
            .gate
            .publish(&self.path, || std::fs::rename(&self.tmp_path, &self.path))
        {
            let _ = std::fs::remove_file(&self.tmp_path);
            return Err(e.with_context(format!("publishing records to {:?}", self.path)));
        }
        tracing::debug!(path = ?self.path, rows = self.rows, "Record file published");
        Ok(self.path.clone())
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        if self.encoder.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

impl RecordSink for RecordWriter {
    fn write_record(&mut self, record: &ListenerRecord) -> std::io::Result<()> {
        self.append(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    fn close(self: Box<Self>) -> std::io::Result<()> {
        RecordWriter::finish(*self)
            .map(|_| ())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }
}

/// Reads every row of a record file.
pub fn read_records<T, P>(path: P) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::not_found(path.display().to_string())
        } else {
            StoreError::from(e).with_context(format!("opening {:?}", path))
        }
    })?;
    let reader = BufReader::new(GzDecoder::new(file));
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|e| {
            StoreError::corrupt(format!("{:?} line {}: {}", path, line_no + 1, e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}
