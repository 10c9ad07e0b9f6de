//! Server configuration

use dermascan_inference::{ArtifactLocation, InferenceConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the prediction history file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Inference pipeline configuration
    #[serde(default = "default_inference")]
    pub inference: InferenceConfig,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(bucket) = &cli.bucket {
            config.inference.artifact.bucket = bucket.clone();
        }

        if let Some(prefix) = &cli.prefix {
            config.inference.artifact.prefix = prefix.clone();
        }

        if let Some(data_dir) = &cli.data_dir {
            config.data_dir = data_dir.clone();
        }

        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            data_dir: default_data_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            inference: default_inference(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_upload_bytes() -> usize {
    1_000_000
}

fn default_inference() -> InferenceConfig {
    InferenceConfig::new(ArtifactLocation::new("buckets-ml", "data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.listen, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes, 1_000_000);
        assert_eq!(config.inference.threshold, 0.58);
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
port: 9090
inference:
  artifact:
    bucket: lesion-models
    prefix: v2
  threshold: 0.6
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.listen, "0.0.0.0");
        assert_eq!(config.inference.artifact.bucket, "lesion-models");
        assert_eq!(config.inference.threshold, 0.6);
        // Unset inference fields keep their defaults
        assert_eq!(config.inference.topology_file, "model.json");
    }
}
