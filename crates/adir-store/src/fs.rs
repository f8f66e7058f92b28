//! The local filesystem backend: an OCI-layout-shaped tree on disk.
//!
//! ```text
//! <root>/blobs/<digest>.bin        content-addressed blob bytes
//! <root>/manifests/<digest>.json   manifest documents, also content-addressed
//! <root>/tags.json                 the mutable name/version -> digest index
//! ```
//!
//! This is the tested default backend; `ready()` is unconditionally true
//! once the root directory exists and is writable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::{Backend, TagEntry};
use crate::error::{StoreError, StoreResult};
use crate::manifest::Manifest;

pub struct FsBackend {
    root: PathBuf,
    /// Tag-index reads are lock-free (a fresh read of `tags.json`);
    /// writes are serialized through this mutex so two concurrent pushes
    /// never interleave a read-modify-write cycle on the file.
    tag_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TagIndex {
    entries: Vec<StoredTagEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTagEntry {
    name: String,
    version: String,
    digest: String,
    pushed_at: chrono::DateTime<Utc>,
}

impl FsBackend {
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("blobs"))
            .await
            .map_err(|e| StoreError::Other(format!("creating blobs dir: {e}")))?;
        fs::create_dir_all(root.join("manifests"))
            .await
            .map_err(|e| StoreError::Other(format!("creating manifests dir: {e}")))?;
        Ok(Self { root, tag_lock: Mutex::new(()) })
    }

    fn blob_path(&self, digest: &str) -> PathBuf {
        self.root.join("blobs").join(format!("{digest}.bin"))
    }

    fn manifest_path(&self, digest: &str) -> PathBuf {
        self.root.join("manifests").join(format!("{digest}.json"))
    }

    fn tags_path(&self) -> PathBuf {
        self.root.join("tags.json")
    }

    async fn read_index(&self) -> StoreResult<TagIndex> {
        match fs::read(self.tags_path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Other(format!("corrupt tag index: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TagIndex::default()),
            Err(e) => Err(StoreError::Other(format!("reading tag index: {e}"))),
        }
    }

    async fn write_index(&self, index: &TagIndex) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| StoreError::Other(format!("encoding tag index: {e}")))?;
        let tmp = self.tags_path().with_extension("json.tmp");
        fs::write(&tmp, bytes).await.map_err(|e| StoreError::Other(format!("writing tag index: {e}")))?;
        fs::rename(&tmp, self.tags_path())
            .await
            .map_err(|e| StoreError::Other(format!("committing tag index: {e}")))
    }
}

#[async_trait]
impl Backend for FsBackend {
    async fn put_blob(&self, digest: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.blob_path(digest);
        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(digest, "blob already present, skipping write");
            return Ok(());
        }
        fs::write(&path, bytes).await.map_err(|e| StoreError::Other(format!("writing blob: {e}")))
    }

    async fn get_blob(&self, digest: &str) -> StoreResult<Vec<u8>> {
        fs::read(self.blob_path(digest))
            .await
            .map_err(|_| StoreError::UnknownCid(digest.to_string()))
    }

    async fn delete_blob(&self, digest: &str) -> StoreResult<()> {
        match fs::remove_file(self.blob_path(digest)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Other(format!("deleting blob: {e}"))),
        }
    }

    async fn put_manifest(&self, digest: &str, manifest: &Manifest) -> StoreResult<()> {
        let bytes = serde_json::to_vec(manifest)
            .map_err(|e| StoreError::Other(format!("encoding manifest: {e}")))?;
        fs::write(self.manifest_path(digest), bytes)
            .await
            .map_err(|e| StoreError::Other(format!("writing manifest: {e}")))
    }

    async fn get_manifest(&self, digest: &str) -> StoreResult<Manifest> {
        let bytes = fs::read(self.manifest_path(digest))
            .await
            .map_err(|_| StoreError::UnknownCid(digest.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Other(format!("corrupt manifest: {e}")))
    }

    async fn delete_manifest(&self, digest: &str) -> StoreResult<()> {
        match fs::remove_file(self.manifest_path(digest)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Other(format!("deleting manifest: {e}"))),
        }
    }

    async fn list_tags(&self) -> StoreResult<Vec<TagEntry>> {
        let index = self.read_index().await?;
        Ok(index
            .entries
            .into_iter()
            .map(|e| TagEntry { name: e.name, version: e.version, digest: e.digest, pushed_at: e.pushed_at })
            .collect())
    }

    async fn resolve_tag(&self, name: &str, version: Option<&str>) -> StoreResult<Option<String>> {
        let index = self.read_index().await?;
        match version {
            Some(v) => Ok(index
                .entries
                .iter()
                .find(|e| e.name == name && e.version == v)
                .map(|e| e.digest.clone())),
            None => Ok(index
                .entries
                .iter()
                .filter(|e| e.name == name)
                .max_by_key(|e| e.pushed_at)
                .map(|e| e.digest.clone())),
        }
    }

    async fn tag(&self, name: &str, version: &str, digest: &str) -> StoreResult<()> {
        let _guard = self.tag_lock.lock().await;
        let mut index = self.read_index().await?;
        let now = Utc::now();
        match index.entries.iter_mut().find(|e| e.name == name && e.version == version) {
            Some(existing) => {
                existing.digest = digest.to_string();
                existing.pushed_at = now;
            }
            None => index.entries.push(StoredTagEntry {
                name: name.to_string(),
                version: version.to_string(),
                digest: digest.to_string(),
                pushed_at: now,
            }),
        }
        self.write_index(&index).await
    }

    async fn untag(&self, name: &str, version: &str) -> StoreResult<()> {
        let _guard = self.tag_lock.lock().await;
        let mut index = self.read_index().await?;
        let before = index.entries.len();
        index.entries.retain(|e| !(e.name == name && e.version == version));
        if index.entries.len() == before {
            return Err(StoreError::UnknownTag(format!("{name}:{version}")));
        }
        self.write_index(&index).await
    }

    async fn ready(&self, _timeout: Duration) -> bool {
        fs::try_exists(&self.root).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> (FsBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn round_trips_a_blob() {
        let (backend, _dir) = backend().await;
        backend.put_blob("babc", b"hello").await.unwrap();
        assert_eq!(backend.get_blob("babc").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn unknown_blob_is_not_found() {
        let (backend, _dir) = backend().await;
        assert!(backend.get_blob("bnope").await.is_err());
    }

    #[tokio::test]
    async fn tagging_twice_with_same_name_version_overwrites() {
        let (backend, _dir) = backend().await;
        backend.tag("my-agent", "1.0.0", "bcid1").await.unwrap();
        backend.tag("my-agent", "1.0.0", "bcid2").await.unwrap();
        assert_eq!(
            backend.resolve_tag("my-agent", Some("1.0.0")).await.unwrap(),
            Some("bcid2".to_string())
        );
    }

    #[tokio::test]
    async fn bare_name_resolves_to_most_recently_pushed() {
        let (backend, _dir) = backend().await;
        backend.tag("my-agent", "1.0.0", "bcid1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        backend.tag("my-agent", "2.0.0", "bcid2").await.unwrap();
        assert_eq!(backend.resolve_tag("my-agent", None).await.unwrap(), Some("bcid2".to_string()));
    }

    #[tokio::test]
    async fn untag_unknown_is_an_error() {
        let (backend, _dir) = backend().await;
        assert!(backend.untag("nope", "1.0.0").await.is_err());
    }
}
