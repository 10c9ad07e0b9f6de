//! Remote blob store access
//!
//! The artifact store only needs two operations against the remote bucket:
//! downloading a named object and enumerating objects under a prefix. Both
//! are behind a trait so tests can substitute an in-memory store.

use async_trait::async_trait;
use bytes::Bytes;
use dermascan_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Minimal contract against the remote bucket holding model artifacts.
///
/// Object listing order is not guaranteed and callers must not derive shard
/// identity from it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download one object's bytes.
    ///
    /// A missing object maps to `ArtifactUnavailable`; network and auth
    /// failures map to `TransientStore` so callers may retry.
    async fn download(&self, bucket: &str, object: &str) -> Result<Bytes>;

    /// List object names under a prefix, in no particular order.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

/// Blob store speaking the GCS JSON API over HTTP.
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ObjectDescriptor {
    name: String,
}

impl HttpBlobStore {
    /// Create a store against the public GCS endpoint with the given
    /// per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url("https://storage.googleapis.com", timeout)
    }

    /// Create a store against a custom endpoint (emulators, test servers).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn map_status(object: &str, status: reqwest::StatusCode) -> Error {
        if status == reqwest::StatusCode::NOT_FOUND {
            Error::artifact_unavailable(format!("object not found: {object}"))
        } else {
            Error::transient_store(format!("store returned {status} for {object}"))
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn download(&self, bucket: &str, object: &str) -> Result<Bytes> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.base_url,
            bucket,
            encode_object(object)
        );
        debug!(bucket, object, "Downloading object");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::transient_store(format!("download of {object} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::map_status(object, response.status()));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::transient_store(format!("reading body of {object} failed: {e}")))
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/storage/v1/b/{}/o?prefix={}",
            self.base_url,
            bucket,
            encode_object(prefix)
        );
        debug!(bucket, prefix, "Listing objects");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::transient_store(format!("listing {prefix} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::map_status(prefix, response.status()));
        }

        let listing: ListResponse = response
            .json()
            .await
            .map_err(|e| Error::transient_store(format!("parsing listing failed: {e}")))?;

        Ok(listing.items.into_iter().map(|o| o.name).collect())
    }
}

/// Percent-encode the characters GCS object names commonly need escaped.
fn encode_object(object: &str) -> String {
    object
        .chars()
        .map(|c| match c {
            '/' => "%2F".to_string(),
            ' ' => "%20".to_string(),
            '+' => "%2B".to_string(),
            '?' => "%3F".to_string(),
            '#' => "%23".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

/// In-memory blob store for tests and local development.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: std::collections::HashMap<(String, String), Bytes>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object
    pub fn insert(
        &mut self,
        bucket: impl Into<String>,
        object: impl Into<String>,
        data: impl Into<Bytes>,
    ) {
        self.objects
            .insert((bucket.into(), object.into()), data.into());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn download(&self, bucket: &str, object: &str) -> Result<Bytes> {
        self.objects
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
            .ok_or_else(|| Error::artifact_unavailable(format!("object not found: {object}")))
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .keys()
            .filter(|(b, o)| b == bucket && o.starts_with(prefix))
            .map(|(_, o)| o.clone())
            .collect())
    }
}
