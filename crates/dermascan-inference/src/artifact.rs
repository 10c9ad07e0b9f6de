//! Model artifact retrieval and local staging
//!
//! An artifact is one topology descriptor (`model.json`) plus the ordered
//! weight shards it declares. The descriptor is always fetched first; shard
//! identity comes from the index embedded in each filename, never from
//! download or listing order.

use crate::blob::BlobStore;
use crate::config::{ArtifactLocation, InferenceConfig};
use dermascan_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Parsed topology descriptor.
///
/// Mirrors the TF.js graph-model manifest layout the artifacts are published
/// in: one or more weight groups, each listing shard filenames in slot order.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTopology {
    /// Optional format tag, informational only
    #[serde(default)]
    pub format: Option<String>,

    /// Weight groups in load order
    #[serde(rename = "weightsManifest")]
    pub weights_manifest: Vec<WeightsGroup>,
}

/// One group of weight shards
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsGroup {
    /// Shard filenames in declared slot order
    pub paths: Vec<String>,
}

impl ModelTopology {
    /// Parse a descriptor from raw JSON bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let topology: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::model_load(format!("invalid topology descriptor: {e}")))?;
        topology.check_manifest()?;
        Ok(topology)
    }

    /// All declared shard filenames, flattened in manifest order
    pub fn shard_paths(&self) -> Vec<&str> {
        self.weights_manifest
            .iter()
            .flat_map(|g| g.paths.iter().map(String::as_str))
            .collect()
    }

    /// Validate that the filename-embedded indices agree with manifest
    /// positions. Catches reordered manifests and mixed shard sets before
    /// any bytes are assembled.
    fn check_manifest(&self) -> Result<()> {
        let paths = self.shard_paths();
        if paths.is_empty() {
            return Err(Error::model_load(
                "topology declares no weight shards".to_string(),
            ));
        }

        let total = paths.len();
        for (slot, path) in paths.iter().enumerate() {
            let (index, count) = shard_index(path).ok_or_else(|| {
                Error::partial_artifact(format!("unrecognized shard filename: {path}"))
            })?;

            if count != total {
                return Err(Error::partial_artifact(format!(
                    "shard {path} declares {count} shards but manifest lists {total}"
                )));
            }
            // Filenames are 1-based
            if index != slot + 1 {
                return Err(Error::partial_artifact(format!(
                    "shard {path} is in manifest slot {} but names index {index}",
                    slot + 1
                )));
            }
        }

        Ok(())
    }
}

/// Parse `(index, count)` out of a `...shard{N}of{M}` filename.
pub fn shard_index(filename: &str) -> Option<(usize, usize)> {
    let pos = filename.rfind("shard")?;
    let rest = &filename[pos + "shard".len()..];
    let (index, count) = rest.split_once("of")?;
    Some((index.parse().ok()?, count.parse().ok()?))
}

/// What to do with previously staged files before a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Leave existing files in place; downloads overwrite by name
    #[default]
    Retain,
    /// Remove everything in the staging directory before fetching
    PurgeBeforeFetch,
}

/// Local staging area for downloaded artifact files.
///
/// Injected rather than hardcoded so tests can point it at a temp directory.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
    cleanup: CleanupPolicy,
}

impl Staging {
    /// Create a staging area rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, cleanup: CleanupPolicy) -> Self {
        Self {
            dir: dir.into(),
            cleanup,
        }
    }

    /// Directory this staging area writes into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path for a staged file
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create the directory if absent and apply the cleanup policy.
    /// Safe to call repeatedly.
    pub fn prepare(&self) -> Result<()> {
        if self.cleanup == CleanupPolicy::PurgeBeforeFetch && self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Artifact files staged locally, shards in manifest order
#[derive(Debug, Clone)]
pub struct LocalArtifact {
    /// Staged topology descriptor
    pub topology_path: PathBuf,

    /// Parsed topology
    pub topology: ModelTopology,

    /// Staged shard files in declared slot order
    pub shard_paths: Vec<PathBuf>,
}

/// Retrieves a model artifact from the remote store into local staging.
pub struct ArtifactStore {
    blob: Arc<dyn BlobStore>,
    staging: Staging,
    location: ArtifactLocation,
    topology_file: String,
    shard_prefix: String,
    retries: u32,
}

impl ArtifactStore {
    /// Create a store for the configured artifact location
    pub fn new(blob: Arc<dyn BlobStore>, staging: Staging, config: &InferenceConfig) -> Self {
        Self {
            blob,
            staging,
            location: config.artifact.clone(),
            topology_file: config.topology_file.clone(),
            shard_prefix: config.shard_prefix.clone(),
            retries: config.fetch_retries,
        }
    }

    /// Fetch the topology descriptor and every declared shard into staging.
    ///
    /// The descriptor is downloaded first; the shard set it declares is then
    /// checked against the remote listing and downloaded into the slots the
    /// manifest names. Any missing shard fails the whole fetch.
    pub async fn fetch(&self) -> Result<LocalArtifact> {
        self.staging.prepare()?;

        info!(
            bucket = %self.location.bucket,
            prefix = %self.location.prefix,
            "Fetching model artifact"
        );

        // Topology first
        let topology_object = self.location.object(&self.topology_file);
        let topology_bytes = self.download_with_retry(&topology_object).await?;
        let topology = ModelTopology::parse(&topology_bytes)?;

        let topology_path = self.staging.path_for(&self.topology_file);
        std::fs::write(&topology_path, &topology_bytes)?;

        // The remote listing confirms presence only; identity stays with the
        // manifest-declared filename.
        let listing_prefix = self.location.object(&self.shard_prefix);
        let remote_names: HashSet<String> = self
            .list_with_retry(&listing_prefix)
            .await?
            .into_iter()
            .filter_map(|o| o.rsplit('/').next().map(str::to_string))
            .collect();

        let declared = topology.shard_paths();
        for name in &declared {
            if !remote_names.contains(*name) {
                return Err(Error::partial_artifact(format!(
                    "declared shard {name} is not present in the remote store"
                )));
            }
        }

        // Download shards concurrently; each result lands in its declared
        // slot regardless of completion order.
        let downloads = declared.iter().map(|name| self.download_shard(name));
        let shard_bytes = futures::future::try_join_all(downloads).await?;

        let mut shard_paths = Vec::with_capacity(declared.len());
        for (name, bytes) in declared.iter().zip(shard_bytes) {
            let path = self.staging.path_for(name);
            std::fs::write(&path, &bytes)?;
            shard_paths.push(path);
        }

        info!(shards = shard_paths.len(), "Artifact staged locally");

        Ok(LocalArtifact {
            topology_path,
            topology,
            shard_paths,
        })
    }

    async fn download_shard(&self, name: &str) -> Result<bytes::Bytes> {
        let object = self.location.object(name);
        self.download_with_retry(&object).await.map_err(|e| match e {
            // A shard the topology promised but the store no longer has
            Error::ArtifactUnavailable(msg) => Error::partial_artifact(msg),
            other => other,
        })
    }

    /// Download with a bounded number of extra attempts for transient
    /// failures. Permanent not-found errors are never retried.
    async fn download_with_retry(&self, object: &str) -> Result<bytes::Bytes> {
        let mut attempt = 0;
        loop {
            match self.blob.download(&self.location.bucket, object).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    debug!(object, attempt, "Retrying transient download failure: {e}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// List with the same bounded retry policy as downloads.
    async fn list_with_retry(&self, prefix: &str) -> Result<Vec<String>> {
        let mut attempt = 0;
        loop {
            match self.blob.list_objects(&self.location.bucket, prefix).await {
                Ok(names) => return Ok(names),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    debug!(prefix, attempt, "Retrying transient listing failure: {e}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
