//! Single-flight model cache
//!
//! The first request after process start pays the full fetch-and-load cost;
//! every caller that arrives before or during that load receives the same
//! instance once it is ready. After that, reads are shared and perform no
//! load work. A failed load leaves the cache eligible for another attempt;
//! a failed or partial model is never handed out.

use async_trait::async_trait;
use dermascan_core::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Loader injected into the cache.
///
/// Kept as a trait so tests can exercise the cache's concurrency contract
/// without real weights.
#[async_trait]
pub trait LoadModel: Send + Sync {
    /// The model type produced by this loader
    type Model: Send + Sync;

    /// Perform the full acquisition and deserialization
    async fn load(&self) -> Result<Self::Model>;
}

/// Observable lifecycle state of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No load attempted yet
    Unloaded,
    /// A load is in flight
    Loading,
    /// Model resident in memory
    Ready,
    /// Last load attempt failed; the next `get` will retry
    Failed,
}

const STATUS_UNLOADED: u8 = 0;
const STATUS_LOADING: u8 = 1;
const STATUS_READY: u8 = 2;
const STATUS_FAILED: u8 = 3;

/// Lazy, load-once-use-many model cache.
pub struct ModelCache<L: LoadModel> {
    loader: L,
    slot: RwLock<Option<Arc<L::Model>>>,
    load_lock: Mutex<()>,
    status: AtomicU8,
}

impl<L: LoadModel> ModelCache<L> {
    /// Create an unloaded cache around the given loader
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            slot: RwLock::new(None),
            load_lock: Mutex::new(()),
            status: AtomicU8::new(STATUS_UNLOADED),
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> CacheStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_LOADING => CacheStatus::Loading,
            STATUS_READY => CacheStatus::Ready,
            STATUS_FAILED => CacheStatus::Failed,
            _ => CacheStatus::Unloaded,
        }
    }

    /// Get the shared model handle, loading it on first use.
    ///
    /// Concurrent callers during the first load are serialized on a single
    /// load operation and all receive the identical instance.
    pub async fn get(&self) -> Result<Arc<L::Model>> {
        // Shared fast path once Ready
        if let Some(model) = self.slot.read().await.as_ref() {
            return Ok(Arc::clone(model));
        }

        let _flight = self.load_lock.lock().await;

        // A racing caller may have completed the load while we waited
        if let Some(model) = self.slot.read().await.as_ref() {
            return Ok(Arc::clone(model));
        }

        self.status.store(STATUS_LOADING, Ordering::Release);
        info!("Loading model into cache");

        match self.loader.load().await {
            Ok(model) => {
                let model = Arc::new(model);
                *self.slot.write().await = Some(Arc::clone(&model));
                self.status.store(STATUS_READY, Ordering::Release);
                Ok(model)
            }
            Err(e) => {
                self.status.store(STATUS_FAILED, Ordering::Release);
                warn!("Model load failed: {e}");
                Err(match e {
                    wrapped @ Error::ModelLoad(_) => wrapped,
                    other => Error::model_load(other.to_string()),
                })
            }
        }
    }
}
