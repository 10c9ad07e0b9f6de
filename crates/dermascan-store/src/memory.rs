//! In-memory prediction store for tests and ephemeral deployments

use crate::PredictionStore;
use async_trait::async_trait;
use dermascan_core::{PredictionRecord, Result};
use tokio::sync::RwLock;

/// Keeps records in insertion order; contents vanish at process exit.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PredictionRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn save(&self, record: &PredictionRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PredictionRecord>> {
        Ok(self.records.read().await.clone())
    }
}
