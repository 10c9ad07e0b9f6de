//! Dermascan Inference
//!
//! The inference-serving subsystem: remote artifact retrieval, the
//! single-flight model cache, deterministic image preprocessing, Candle
//! scoring, and the per-request prediction pipeline.
//!
//! The model is an opaque binary scoring function; there is no training,
//! versioning, or multi-model routing here.

pub mod artifact;
pub mod blob;
pub mod cache;
pub mod config;
pub mod engine;
pub mod model;
pub mod preprocess;
pub mod service;

pub use artifact::{ArtifactStore, CleanupPolicy, LocalArtifact, ModelTopology, Staging};
pub use blob::{BlobStore, HttpBlobStore, MemoryBlobStore};
pub use cache::{CacheStatus, LoadModel, ModelCache};
pub use config::{ArtifactLocation, InferenceConfig};
pub use engine::InferenceEngine;
pub use model::{ArtifactModelLoader, CachedModel, LesionNet};
pub use preprocess::Preprocessor;
pub use service::{PredictionService, Predictor};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::blob::{BlobStore, HttpBlobStore};
    pub use crate::cache::{CacheStatus, ModelCache};
    pub use crate::config::{ArtifactLocation, InferenceConfig};
    pub use crate::service::{PredictionService, Predictor};
}
