//! The OCI registry backend, gated behind the `oci` feature.
//!
//! Experimental: a generic OCI 1.1 registry is treated as a commodity blob
//! store rather than translated into a first-class Docker-style image —
//! our [`Manifest`] and each layer blob are pushed/pulled as plain OCI
//! blobs under a single synthetic repository per directory name, and the
//! tag index rides along as its own tagged blob. A real OCI-native image
//! mapping (config/layers as actual image layers, one repository per
//! agent) is future work; this backend exists so a directory node can use
//! commodity registry storage without standing up anything bespoke.

use std::time::Duration;

use async_trait::async_trait;
use oci_client::client::{Client, ClientConfig};
use oci_client::secrets::RegistryAuth;
use oci_client::Reference;
use tokio::sync::Mutex;

use crate::backend::{Backend, TagEntry};
use crate::error::{StoreError, StoreResult};
use crate::manifest::Manifest;

pub struct OciBackend {
    client: Client,
    auth: RegistryAuth,
    /// `registry.example.com/directory-name` — every blob for this node
    /// lives under this one synthetic repository.
    repository: String,
    tag_lock: Mutex<()>,
}

const TAG_INDEX_BLOB_TAG: &str = "tag-index";

impl OciBackend {
    pub fn new(repository: impl Into<String>, auth: RegistryAuth) -> Self {
        Self {
            client: Client::new(ClientConfig::default()),
            auth,
            repository: repository.into(),
            tag_lock: Mutex::new(()),
        }
    }

    fn reference(&self, tag: &str) -> StoreResult<Reference> {
        format!("{}:{}", self.repository, tag)
            .parse()
            .map_err(|e| StoreError::Other(format!("invalid OCI reference: {e}")))
    }
}

#[async_trait]
impl Backend for OciBackend {
    async fn put_blob(&self, digest: &str, bytes: &[u8]) -> StoreResult<()> {
        let reference = self.reference(digest)?;
        self.client
            .push_blob(&reference, bytes, digest)
            .await
            .map_err(|e| StoreError::Unavailable(format!("pushing blob to registry: {e}")))?;
        Ok(())
    }

    async fn get_blob(&self, digest: &str) -> StoreResult<Vec<u8>> {
        let reference = self.reference(digest)?;
        let mut out = Vec::new();
        self.client
            .pull_blob(&reference, digest, &mut out)
            .await
            .map_err(|_| StoreError::UnknownCid(digest.to_string()))?;
        Ok(out)
    }

    async fn delete_blob(&self, _digest: &str) -> StoreResult<()> {
        // Generic OCI distribution does not guarantee blob deletion support;
        // left as a no-op until a registry-specific deletion API is wired in.
        Ok(())
    }

    async fn put_manifest(&self, digest: &str, manifest: &Manifest) -> StoreResult<()> {
        let bytes = serde_json::to_vec(manifest)
            .map_err(|e| StoreError::Other(format!("encoding manifest: {e}")))?;
        self.put_blob(digest, &bytes).await
    }

    async fn get_manifest(&self, digest: &str) -> StoreResult<Manifest> {
        let bytes = self.get_blob(digest).await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Other(format!("corrupt manifest: {e}")))
    }

    async fn delete_manifest(&self, digest: &str) -> StoreResult<()> {
        self.delete_blob(digest).await
    }

    async fn list_tags(&self) -> StoreResult<Vec<TagEntry>> {
        let index = self.read_tag_index().await?;
        Ok(index)
    }

    async fn resolve_tag(&self, name: &str, version: Option<&str>) -> StoreResult<Option<String>> {
        let index = self.read_tag_index().await?;
        Ok(match version {
            Some(v) => index.into_iter().find(|e| e.name == name && e.version == v).map(|e| e.digest),
            None => index.into_iter().filter(|e| e.name == name).max_by_key(|e| e.pushed_at).map(|e| e.digest),
        })
    }

    async fn tag(&self, name: &str, version: &str, digest: &str) -> StoreResult<()> {
        let _guard = self.tag_lock.lock().await;
        let mut index = self.read_tag_index().await.unwrap_or_default();
        let now = chrono::Utc::now();
        match index.iter_mut().find(|e| e.name == name && e.version == version) {
            Some(existing) => {
                existing.digest = digest.to_string();
                existing.pushed_at = now;
            }
            None => index.push(TagEntry {
                name: name.to_string(),
                version: version.to_string(),
                digest: digest.to_string(),
                pushed_at: now,
            }),
        }
        self.write_tag_index(&index).await
    }

    async fn untag(&self, name: &str, version: &str) -> StoreResult<()> {
        let _guard = self.tag_lock.lock().await;
        let mut index = self.read_tag_index().await?;
        let before = index.len();
        index.retain(|e| !(e.name == name && e.version == version));
        if index.len() == before {
            return Err(StoreError::UnknownTag(format!("{name}:{version}")));
        }
        self.write_tag_index(&index).await
    }

    async fn ready(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.client.auth(&self.reference("tag-index").unwrap(), &self.auth, oci_client::RegistryOperation::Pull))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

impl OciBackend {
    async fn read_tag_index(&self) -> StoreResult<Vec<TagEntry>> {
        let bytes = match self.get_blob(TAG_INDEX_BLOB_TAG).await {
            Ok(bytes) => bytes,
            Err(StoreError::UnknownCid(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Other(format!("corrupt tag index: {e}")))
    }

    async fn write_tag_index(&self, index: &[TagEntry]) -> StoreResult<()> {
        let bytes = serde_json::to_vec(index).map_err(|e| StoreError::Other(format!("encoding tag index: {e}")))?;
        self.put_blob(TAG_INDEX_BLOB_TAG, &bytes).await
    }
}
