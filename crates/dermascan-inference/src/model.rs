//! Candle model assembly and loading
//!
//! Shards are ordered byte-partitions of a single safetensors blob. Loading
//! concatenates them into their manifest-declared slots, memory-maps the
//! result, and builds the `LesionNet` graph from it.

use crate::artifact::{ArtifactStore, LocalArtifact, Staging};
use crate::cache::LoadModel;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder};
use dermascan_core::{Error, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Filename of the assembled weights blob inside staging
const ASSEMBLED_WEIGHTS: &str = "weights.safetensors";

/// Binary lesion classifier: two conv/pool blocks feeding a small MLP head
/// with a sigmoid output, one scalar in [0,1] per image.
pub struct LesionNet {
    conv1: Conv2d,
    conv2: Conv2d,
    fc1: Linear,
    fc2: Linear,
}

impl LesionNet {
    /// Build the graph from loaded weights.
    ///
    /// `input_size` is (height, width); both conv blocks pool by 4, so the
    /// flattened feature size depends on it.
    pub fn new(vb: VarBuilder, input_size: (usize, usize)) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };

        let conv1 = candle_nn::conv2d(3, 8, 3, cfg, vb.pp("conv1"))
            .map_err(|e| Error::model_load(format!("failed to build conv1: {e}")))?;
        let conv2 = candle_nn::conv2d(8, 16, 3, cfg, vb.pp("conv2"))
            .map_err(|e| Error::model_load(format!("failed to build conv2: {e}")))?;

        let (h, w) = input_size;
        let features = 16 * (h / 16) * (w / 16);
        let fc1 = candle_nn::linear(features, 32, vb.pp("fc1"))
            .map_err(|e| Error::model_load(format!("failed to build fc1: {e}")))?;
        let fc2 = candle_nn::linear(32, 1, vb.pp("fc2"))
            .map_err(|e| Error::model_load(format!("failed to build fc2: {e}")))?;

        Ok(Self {
            conv1,
            conv2,
            fc1,
            fc2,
        })
    }

    /// Forward pass over an NHWC batch, returning sigmoid scores of shape
    /// [batch, 1].
    pub fn forward(&self, nhwc: &Tensor) -> candle_core::Result<Tensor> {
        let x = nhwc.permute((0, 3, 1, 2))?;
        let x = self.conv1.forward(&x)?.relu()?.max_pool2d(4)?;
        let x = self.conv2.forward(&x)?.relu()?.max_pool2d(4)?;
        let x = x.flatten_from(1)?;
        let x = self.fc1.forward(&x)?.relu()?;
        let x = self.fc2.forward(&x)?;
        candle_nn::ops::sigmoid(&x)
    }
}

/// The process-wide model instance.
///
/// Immutable once constructed; inference never mutates it, so a single
/// instance is shared read-only across all request tasks.
pub struct CachedModel {
    net: LesionNet,
    input_size: (usize, usize),
}

impl CachedModel {
    /// Create from a loaded network
    pub fn new(net: LesionNet, input_size: (usize, usize)) -> Self {
        Self { net, input_size }
    }

    /// Expected input size as (height, width)
    pub fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    /// Run the network over an NHWC batch
    pub fn forward(&self, nhwc: &Tensor) -> candle_core::Result<Tensor> {
        self.net.forward(nhwc)
    }
}

/// Concatenate staged shards into the single weights blob, in manifest
/// order. Every declared shard must be present locally first.
pub fn assemble_weights(artifact: &LocalArtifact, staging: &Staging) -> Result<PathBuf> {
    for path in &artifact.shard_paths {
        if !path.exists() {
            return Err(Error::partial_artifact(format!(
                "staged shard missing before assembly: {}",
                path.display()
            )));
        }
    }

    let out_path = staging.path_for(ASSEMBLED_WEIGHTS);
    let mut out = std::io::BufWriter::new(std::fs::File::create(&out_path)?);
    for path in &artifact.shard_paths {
        let bytes = std::fs::read(path)?;
        out.write_all(&bytes)?;
    }
    out.flush()?;

    Ok(out_path)
}

/// Deserialize the assembled weights and construct the model.
pub fn load_model(
    artifact: &LocalArtifact,
    staging: &Staging,
    device: &Device,
    input_size: (usize, usize),
) -> Result<CachedModel> {
    let weights_path = assemble_weights(artifact, staging)?;

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
            .map_err(|e| Error::model_load(format!("failed to read weights: {e}")))?
    };

    let net = LesionNet::new(vb, input_size)?;
    Ok(CachedModel::new(net, input_size))
}

/// Loader wiring artifact retrieval to model construction; injected into the
/// model cache so the cache itself stays free of fetch details.
pub struct ArtifactModelLoader {
    store: ArtifactStore,
    staging: Staging,
    device: Device,
    input_size: (usize, usize),
}

impl ArtifactModelLoader {
    /// Create a loader that stages into `staging` and targets `device`
    pub fn new(
        store: ArtifactStore,
        staging: Staging,
        device: Device,
        input_size: (usize, usize),
    ) -> Self {
        Self {
            store,
            staging,
            device,
            input_size,
        }
    }
}

#[async_trait]
impl LoadModel for ArtifactModelLoader {
    type Model = CachedModel;

    async fn load(&self) -> Result<CachedModel> {
        let start = Instant::now();

        let artifact = self.store.fetch().await?;
        let model = load_model(&artifact, &self.staging, &self.device, self.input_size)?;

        let elapsed = start.elapsed();
        metrics::histogram!("dermascan_model_load_seconds").record(elapsed.as_secs_f64());
        info!(elapsed_ms = elapsed.as_millis() as u64, "Model loaded");

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{CleanupPolicy, ModelTopology};
    use tempfile::TempDir;

    fn staged_artifact(dir: &std::path::Path, shards: &[&[u8]]) -> LocalArtifact {
        let names: Vec<String> = (1..=shards.len())
            .map(|i| format!("group1-shard{i}of{}", shards.len()))
            .collect();
        let manifest = names
            .iter()
            .map(|n| format!("\"{n}\""))
            .collect::<Vec<_>>()
            .join(",");
        let json = format!("{{\"weightsManifest\":[{{\"paths\":[{manifest}]}}]}}");

        let topology_path = dir.join("model.json");
        std::fs::write(&topology_path, &json).unwrap();

        let mut shard_paths = Vec::new();
        for (name, bytes) in names.iter().zip(shards) {
            let path = dir.join(name);
            std::fs::write(&path, bytes).unwrap();
            shard_paths.push(path);
        }

        LocalArtifact {
            topology_path,
            topology: ModelTopology::parse(json.as_bytes()).unwrap(),
            shard_paths,
        }
    }

    #[test]
    fn test_assemble_concatenates_in_manifest_order() {
        let temp = TempDir::new().unwrap();
        let staging = Staging::new(temp.path(), CleanupPolicy::Retain);
        let artifact = staged_artifact(temp.path(), &[b"abc", b"def", b"gh"]);

        let path = assemble_weights(&artifact, &staging).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"abcdefgh".to_vec());
    }

    #[test]
    fn test_assemble_fails_on_missing_shard() {
        let temp = TempDir::new().unwrap();
        let staging = Staging::new(temp.path(), CleanupPolicy::Retain);
        let mut artifact = staged_artifact(temp.path(), &[b"abc", b"def"]);

        std::fs::remove_file(&artifact.shard_paths[1]).unwrap();
        artifact.shard_paths[1] = temp.path().join("group1-shard2of2");

        let err = assemble_weights(&artifact, &staging).unwrap_err();
        assert!(matches!(err, Error::PartialArtifact(_)));
    }
}
