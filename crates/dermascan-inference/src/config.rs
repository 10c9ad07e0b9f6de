//! Inference configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Remote location of a model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// Bucket holding the artifact
    pub bucket: String,

    /// Object path prefix under which topology and shards live
    pub prefix: String,
}

impl ArtifactLocation {
    /// Create a new location
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Full object path for a file under this location's prefix
    pub fn object(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), name)
        }
    }
}

/// Configuration for the inference pipeline.
///
/// Values that the original deployment embedded as literals (threshold,
/// input size, normalization divisor) are lifted here so they can be set
/// per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Remote artifact location
    pub artifact: ArtifactLocation,

    /// Topology descriptor filename within the artifact prefix
    #[serde(default = "default_topology_file")]
    pub topology_file: String,

    /// Filename prefix identifying weight shards
    #[serde(default = "default_shard_prefix")]
    pub shard_prefix: String,

    /// Local staging directory for downloaded artifact files
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Decision threshold; scores strictly above it classify as Cancer
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Model input size as (height, width)
    #[serde(default = "default_input_size")]
    pub input_size: (usize, usize),

    /// Divisor mapping 8-bit channel values into [0,1]
    #[serde(default = "default_normalization_divisor")]
    pub normalization_divisor: f32,

    /// Per-request timeout for remote store calls, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Extra attempts for transient remote-store failures
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
}

impl InferenceConfig {
    /// Create a configuration with defaults for the given artifact location
    pub fn new(artifact: ArtifactLocation) -> Self {
        Self {
            artifact,
            topology_file: default_topology_file(),
            shard_prefix: default_shard_prefix(),
            staging_dir: default_staging_dir(),
            threshold: default_threshold(),
            input_size: default_input_size(),
            normalization_divisor: default_normalization_divisor(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_retries: default_fetch_retries(),
        }
    }

    /// Remote-store timeout as a `Duration`
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_topology_file() -> String {
    "model.json".to_string()
}

fn default_shard_prefix() -> String {
    "group1-shard".to_string()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./model-staging")
}

fn default_threshold() -> f32 {
    0.58
}

fn default_input_size() -> (usize, usize) {
    (224, 224)
}

fn default_normalization_divisor() -> f32 {
    255.0
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_fetch_retries() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InferenceConfig::new(ArtifactLocation::new("lesion-models", "data"));

        assert_eq!(config.threshold, 0.58);
        assert_eq!(config.input_size, (224, 224));
        assert_eq!(config.normalization_divisor, 255.0);
        assert_eq!(config.topology_file, "model.json");
        assert_eq!(config.shard_prefix, "group1-shard");
        assert_eq!(config.fetch_retries, 1);
    }

    #[test]
    fn test_object_path_joins_prefix() {
        let location = ArtifactLocation::new("lesion-models", "data/");
        assert_eq!(location.object("model.json"), "data/model.json");

        let bare = ArtifactLocation::new("lesion-models", "");
        assert_eq!(bare.object("model.json"), "model.json");
    }
}
