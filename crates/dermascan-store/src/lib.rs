//! Persistence for prediction histories.
//!
//! The server keeps every successful classification as a
//! [`PredictionRecord`](dermascan_core::PredictionRecord). The
//! [`PredictionStore`] trait abstracts where those records live so the HTTP
//! layer can be tested against [`MemoryStore`] while production appends to a
//! [`JsonlStore`] file.

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use dermascan_core::{PredictionRecord, Result};

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Durable (or at least ordered) storage for prediction records.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Append a record. An error here must fail the surrounding request;
    /// a prediction the caller cannot later retrieve was never recorded.
    async fn save(&self, record: &PredictionRecord) -> Result<()>;

    /// All records in the order they were saved.
    async fn list_all(&self) -> Result<Vec<PredictionRecord>>;
}

pub mod prelude {
    pub use crate::{JsonlStore, MemoryStore, PredictionStore};
}
