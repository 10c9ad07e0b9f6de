//! File-backed prediction store
//!
//! Append-only JSON-lines file, one record per line. Appends flush
//! immediately; a record is durable once `save` returns.

use crate::PredictionStore;
use async_trait::async_trait;
use dermascan_core::{Error, PredictionRecord, Result};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// JSON-lines prediction store rooted in a data directory.
pub struct JsonlStore {
    path: PathBuf,
    // Serializes appends; reads reopen the file independently
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (or create) a store under `data_dir`, creating the directory
    /// if absent.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        Ok(Self {
            path: data_dir.join("predictions.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PredictionStore for JsonlStore {
    async fn save(&self, record: &PredictionRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::storage("store writer poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;

        debug!(id = %record.id, "Prediction persisted");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PredictionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<PredictionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // A torn write must not hide the rest of the history
                    warn!("Skipping unparseable record line: {e}");
                }
            }
        }

        Ok(records)
    }
}
