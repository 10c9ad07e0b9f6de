//! Error types for Dermascan

/// Result type alias using Dermascan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Dermascan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The artifact's topology descriptor could not be found in the remote store
    #[error("artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    /// One or more weight shards declared by the topology failed to download
    #[error("partial artifact: {0}")]
    PartialArtifact(String),

    /// Network or auth failure against the remote store; safe to retry
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// Model deserialization or cache-load failure
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Uploaded bytes could not be decoded as an image
    #[error("unsupported image format: {0}")]
    UnsupportedImage(String),

    /// The model rejected the input tensor
    #[error("inference error: {0}")]
    Inference(String),

    /// Orchestration wrapper for any pipeline stage failure
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// Persistence errors from the record store
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new artifact-unavailable error
    pub fn artifact_unavailable(msg: impl Into<String>) -> Self {
        Self::ArtifactUnavailable(msg.into())
    }

    /// Create a new partial-artifact error
    pub fn partial_artifact(msg: impl Into<String>) -> Self {
        Self::PartialArtifact(msg.into())
    }

    /// Create a new transient store error
    pub fn transient_store(msg: impl Into<String>) -> Self {
        Self::TransientStore(msg.into())
    }

    /// Create a new model-load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new unsupported-image error
    pub fn unsupported_image(msg: impl Into<String>) -> Self {
        Self::UnsupportedImage(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new prediction error
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the failed operation can reasonably succeed.
    ///
    /// Only remote-store failures caused by the network or auth are
    /// retryable; a missing topology or a malformed shard set is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }
}
