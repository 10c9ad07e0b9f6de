//! Prediction orchestration
//!
//! One request flows Preprocessor → ModelCache → InferenceEngine. The
//! service knows nothing about storage; the caller persists the outcome.

use crate::artifact::{ArtifactStore, CleanupPolicy, Staging};
use crate::blob::BlobStore;
use crate::cache::{LoadModel, ModelCache};
use crate::config::InferenceConfig;
use crate::engine::InferenceEngine;
use crate::model::{ArtifactModelLoader, CachedModel};
use crate::preprocess::Preprocessor;
use async_trait::async_trait;
use candle_core::Device;
use dermascan_core::{Diagnosis, Error, Result};
use std::sync::Arc;
use tracing::{debug, error};

/// Classification entry point consumed by the HTTP layer.
///
/// A trait seam so route tests can substitute a canned predictor.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Classify one uploaded image
    async fn classify(&self, image_bytes: &[u8]) -> Result<Diagnosis>;
}

/// Orchestrates the inference pipeline for one request at a time; distinct
/// requests run independently and share only the cached model.
pub struct PredictionService<L: LoadModel<Model = CachedModel>> {
    preprocessor: Preprocessor,
    cache: Arc<ModelCache<L>>,
    engine: InferenceEngine,
}

impl<L: LoadModel<Model = CachedModel>> PredictionService<L> {
    /// Assemble a service from its parts
    pub fn new(
        preprocessor: Preprocessor,
        cache: Arc<ModelCache<L>>,
        engine: InferenceEngine,
    ) -> Self {
        Self {
            preprocessor,
            cache,
            engine,
        }
    }

    /// Shared handle to the model cache, for status reporting
    pub fn cache(&self) -> &Arc<ModelCache<L>> {
        &self.cache
    }
}

impl PredictionService<ArtifactModelLoader> {
    /// Wire up the production pipeline from configuration and a blob store.
    pub fn from_config(config: &InferenceConfig, blob: Arc<dyn BlobStore>) -> Self {
        let device = Device::Cpu;
        let staging = Staging::new(&config.staging_dir, CleanupPolicy::Retain);
        let store = ArtifactStore::new(blob, staging.clone(), config);
        let loader = ArtifactModelLoader::new(store, staging, device.clone(), config.input_size);

        Self::new(
            Preprocessor::new(config.input_size, config.normalization_divisor, device),
            Arc::new(ModelCache::new(loader)),
            InferenceEngine::new(config.threshold),
        )
    }
}

#[async_trait]
impl<L: LoadModel<Model = CachedModel>> Predictor for PredictionService<L> {
    async fn classify(&self, image_bytes: &[u8]) -> Result<Diagnosis> {
        let tensor = self
            .preprocessor
            .normalize(image_bytes)
            .map_err(|e| stage_failure("preprocess", e))?;

        let model = self
            .cache
            .get()
            .await
            .map_err(|e| stage_failure("model load", e))?;

        let score = self
            .engine
            .score(&tensor, &model)
            .map_err(|e| stage_failure("scoring", e))?;
        let label = self.engine.decide(score);

        debug!(score, %label, "Classification complete");
        metrics::counter!("dermascan_predictions_total", "result" => label.to_string())
            .increment(1);

        Ok(label)
    }
}

/// Wrap a stage error for the caller; the underlying detail is logged here
/// and not surfaced verbatim to clients.
fn stage_failure(stage: &str, err: Error) -> Error {
    error!("Prediction pipeline failed at {stage}: {err}");
    Error::prediction(format!("{stage} failed: {err}"))
}
