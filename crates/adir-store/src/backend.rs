use async_trait::async_trait;

use crate::error::StoreResult;
use crate::manifest::Manifest;

/// Storage primitives a content store is built on: content-addressed
/// blobs, manifests, and the mutable name→CID tag index sitting on top
/// of them. Two implementations ship in this crate: [`crate::fs::FsBackend`]
/// (the tested default) and, behind the `oci` feature,
/// [`crate::oci::OciBackend`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn put_blob(&self, digest: &str, bytes: &[u8]) -> StoreResult<()>;
    async fn get_blob(&self, digest: &str) -> StoreResult<Vec<u8>>;
    async fn delete_blob(&self, digest: &str) -> StoreResult<()>;

    async fn put_manifest(&self, digest: &str, manifest: &Manifest) -> StoreResult<()>;
    async fn get_manifest(&self, digest: &str) -> StoreResult<Manifest>;
    async fn delete_manifest(&self, digest: &str) -> StoreResult<()>;

    /// List every `(name, version) -> digest` tag entry currently stored.
    async fn list_tags(&self) -> StoreResult<Vec<TagEntry>>;
    /// Resolve a tag to its digest. `version: None` means "the bare name".
    async fn resolve_tag(&self, name: &str, version: Option<&str>) -> StoreResult<Option<String>>;
    async fn tag(&self, name: &str, version: &str, digest: &str) -> StoreResult<()>;
    async fn untag(&self, name: &str, version: &str) -> StoreResult<()>;

    /// Best-effort readiness probe with a bounded timeout.
    async fn ready(&self, timeout: std::time::Duration) -> bool;
}

/// One row of the tag index, as returned by [`Backend::list_tags`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TagEntry {
    pub name: String,
    pub version: String,
    pub digest: String,
    pub pushed_at: chrono::DateTime<chrono::Utc>,
}
