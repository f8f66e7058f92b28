//! [`ContentStore`]: the public surface every other crate in the
//! workspace talks to. Wraps a [`Backend`] with manifest composition,
//! tag-resolution precedence, and digest verification on pull.

use std::sync::Arc;

use adir_codec::{digest_of, parse_reference};
use adir_core::{Cid, Domain, Locator, Module, Record, Reference, Skill};
use semver::Version;
use tracing::{info, warn};

use crate::backend::{Backend, TagEntry};
use crate::error::{StoreError, StoreResult};
use crate::manifest::{self, media_types, Manifest, RecordConfig};

/// A record pulled back out of the store, with its manifest alongside for
/// callers (the peer layer's layer-request path) that want to act on
/// individual entity groups without re-fetching everything.
pub struct PulledRecord {
    pub record: Record,
    pub manifest: Manifest,
    pub cid: Cid,
}

pub struct ContentStore<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> Clone for ContentStore<B> {
    fn clone(&self) -> Self {
        Self { backend: self.backend.clone() }
    }
}

impl<B: Backend> ContentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    /// Split `record` into its manifest and blobs, write every blob and
    /// the manifest, then tag `(name, version)` to the manifest's CID.
    /// Returns the manifest CID — the record's content address.
    pub async fn push(&self, record: &Record) -> StoreResult<Cid> {
        let split = manifest::split(record)?;
        let manifest_bytes = adir_codec::canonicalize(&split.manifest)?;
        let manifest_cid = digest_of(&manifest_bytes);
        let manifest_digest = manifest_cid.to_encoded();

        self.backend.put_blob(&split.manifest.config.digest, &split.config_bytes).await?;
        for (descriptor, bytes) in &split.layer_bytes {
            self.backend.put_blob(&descriptor.digest, bytes).await?;
        }
        self.backend.put_manifest(&manifest_digest, &split.manifest).await?;
        self.backend.tag(&record.name, &record.version, &manifest_digest).await?;

        info!(cid = %manifest_cid, name = %record.name, version = %record.version, "pushed record");
        Ok(manifest_cid)
    }

    /// Fetch a record back by its manifest CID, verifying every blob's
    /// digest against its descriptor before reassembling.
    pub async fn pull(&self, cid: &Cid) -> StoreResult<PulledRecord> {
        let digest = cid.to_encoded();
        let manifest = self.backend.get_manifest(&digest).await?;

        let config_bytes = self.fetch_verified(&manifest.config.digest).await?;
        let config: RecordConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| StoreError::Other(format!("corrupt config blob: {e}")))?;

        let mut skills = Vec::new();
        let mut domains = Vec::new();
        let mut locators = Vec::new();
        let mut modules = Vec::new();

        for descriptor in &manifest.layers {
            let bytes = self.fetch_verified(&descriptor.digest).await?;
            match descriptor.media_type.as_str() {
                media_types::SKILLS => {
                    skills = serde_json::from_slice::<Vec<Skill>>(&bytes)
                        .map_err(|e| StoreError::Other(format!("corrupt skills layer: {e}")))?;
                }
                media_types::DOMAINS => {
                    domains = serde_json::from_slice::<Vec<Domain>>(&bytes)
                        .map_err(|e| StoreError::Other(format!("corrupt domains layer: {e}")))?;
                }
                media_types::LOCATORS => {
                    locators = serde_json::from_slice::<Vec<Locator>>(&bytes)
                        .map_err(|e| StoreError::Other(format!("corrupt locators layer: {e}")))?;
                }
                media_types::MODULES => {
                    modules = serde_json::from_slice::<Vec<Module>>(&bytes)
                        .map_err(|e| StoreError::Other(format!("corrupt modules layer: {e}")))?;
                }
                other => warn!(media_type = other, "ignoring unrecognized manifest layer"),
            }
        }

        let record = Record {
            schema_version: config.schema_version,
            name: config.name,
            version: config.version,
            created_at: config.created_at,
            authors: config.authors,
            description: config.description,
            skills,
            domains,
            locators,
            modules,
            signatures: config.signatures,
            annotations: manifest.annotations.clone(),
        };

        Ok(PulledRecord { record, manifest, cid: cid.clone() })
    }

    /// Pull by any of the five reference shapes, resolving through the
    /// tag index first when the reference doesn't already carry a CID.
    pub async fn pull_by_ref(&self, reference_str: &str) -> StoreResult<PulledRecord> {
        let reference = parse_reference(reference_str)?;
        self.pull_reference(&reference).await
    }

    pub async fn pull_reference(&self, reference: &Reference) -> StoreResult<PulledRecord> {
        let cid = self.resolve(reference).await?;
        let pulled = self.pull(&cid).await?;
        if let Some(want) = &reference.cid {
            if want != &cid {
                return Err(StoreError::DigestMismatch { expected: want.clone(), actual: cid });
            }
        }
        Ok(pulled)
    }

    /// Fetch a single layer's bytes by the record's manifest CID and the
    /// layer's own digest, without reassembling the whole record — the
    /// operation the peer layer's targeted layer requests need.
    pub async fn pull_layer(&self, cid: &Cid, layer_digest: &str) -> StoreResult<Vec<u8>> {
        let digest = cid.to_encoded();
        let manifest = self.backend.get_manifest(&digest).await?;
        let known = manifest.config.digest == layer_digest
            || manifest.layers.iter().any(|l| l.digest == layer_digest);
        if !known {
            return Err(StoreError::UnknownCid(layer_digest.to_string()));
        }
        self.fetch_verified(layer_digest).await
    }

    /// Write a manifest and its blobs received from a remote peer into the
    /// local backend and tag it, without ever having held a [`Record`] —
    /// the write path `adir-peer` uses after a successful pull-sync. Every
    /// blob is verified against its own digest before anything is written,
    /// so a peer that sends tampered bytes fails before touching storage.
    pub async fn ingest(
        &self,
        name: &str,
        version: &str,
        manifest: Manifest,
        config_bytes: Vec<u8>,
        layer_bytes: Vec<(crate::manifest::Descriptor, Vec<u8>)>,
    ) -> StoreResult<Cid> {
        verify_blob(&manifest.config.digest, &config_bytes)?;
        for (descriptor, bytes) in &layer_bytes {
            verify_blob(&descriptor.digest, bytes)?;
        }

        let manifest_bytes = adir_codec::canonicalize(&manifest)?;
        let manifest_cid = digest_of(&manifest_bytes);
        let manifest_digest = manifest_cid.to_encoded();

        self.backend.put_blob(&manifest.config.digest, &config_bytes).await?;
        for (descriptor, bytes) in &layer_bytes {
            self.backend.put_blob(&descriptor.digest, bytes).await?;
        }
        self.backend.put_manifest(&manifest_digest, &manifest).await?;
        self.backend.tag(name, version, &manifest_digest).await?;

        info!(cid = %manifest_cid, name, version, "ingested record from peer");
        Ok(manifest_cid)
    }

    pub async fn delete(&self, name: &str, version: &str) -> StoreResult<()> {
        self.backend.untag(name, version).await
    }

    pub async fn tags(&self) -> StoreResult<Vec<TagEntry>> {
        self.backend.list_tags().await
    }

    /// Tag-resolution precedence: exact `(name, version)` → latest
    /// semver-valid version for that name → most-recently-pushed CID for
    /// the bare name (the backend already applies that last fallback).
    pub async fn resolve(&self, reference: &Reference) -> StoreResult<Cid> {
        if let Some(cid) = &reference.cid {
            if reference.name.is_none() {
                return Ok(cid.clone());
            }
        }

        let name = reference
            .name
            .as_deref()
            .ok_or_else(|| StoreError::Other("reference has neither name nor CID".into()))?;

        if let Some(version) = &reference.version {
            let digest = self
                .backend
                .resolve_tag(name, Some(version))
                .await?
                .ok_or_else(|| StoreError::UnknownTag(format!("{name}:{version}")))?;
            return parse_cid(&digest);
        }

        if let Some(digest) = self.latest_semver_tag(name).await? {
            return parse_cid(&digest);
        }

        let digest = self
            .backend
            .resolve_tag(name, None)
            .await?
            .ok_or_else(|| StoreError::UnknownTag(name.to_string()))?;
        parse_cid(&digest)
    }

    async fn latest_semver_tag(&self, name: &str) -> StoreResult<Option<String>> {
        let tags = self.backend.list_tags().await?;
        let best = tags
            .into_iter()
            .filter(|t| t.name == name)
            .filter_map(|t| {
                let stripped = t.version.strip_prefix('v').unwrap_or(&t.version);
                Version::parse(stripped).ok().map(|v| (v, t.digest))
            })
            .max_by(|(a, _), (b, _)| a.cmp(b));
        Ok(best.map(|(_, digest)| digest))
    }

    async fn fetch_verified(&self, digest: &str) -> StoreResult<Vec<u8>> {
        let bytes = self.backend.get_blob(digest).await?;
        let actual = digest_of(&bytes);
        let expected = parse_cid(digest)?;
        if actual != expected {
            return Err(StoreError::DigestMismatch { expected, actual });
        }
        Ok(bytes)
    }
}

fn parse_cid(s: &str) -> StoreResult<Cid> {
    Cid::parse(s).ok_or_else(|| StoreError::Other(format!("malformed digest: {s}")))
}

fn verify_blob(digest: &str, bytes: &[u8]) -> StoreResult<()> {
    let actual = digest_of(bytes);
    let expected = parse_cid(digest)?;
    if actual != expected {
        return Err(StoreError::DigestMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FsBackend;
    use chrono::Utc;

    fn sample_record(name: &str, version: &str) -> Record {
        Record {
            schema_version: "v1".into(),
            name: name.into(),
            version: version.into(),
            created_at: Utc::now(),
            authors: vec![],
            description: String::new(),
            skills: vec![Skill { category: "NLP".into(), class: "Text Completion".into() }],
            domains: vec![],
            locators: vec![],
            modules: vec![],
            signatures: vec![],
            annotations: Default::default(),
        }
    }

    async fn store() -> (ContentStore<FsBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        (ContentStore::new(backend), dir)
    }

    #[tokio::test]
    async fn push_then_pull_round_trips_the_record() {
        let (store, _dir) = store().await;
        let record = sample_record("example/agent", "1.0.0");
        let cid = store.push(&record).await.unwrap();
        let pulled = store.pull(&cid).await.unwrap();
        assert_eq!(pulled.record.name, "example/agent");
        assert_eq!(pulled.record.skills.len(), 1);
    }

    #[tokio::test]
    async fn resolves_latest_semver_version_for_bare_name() {
        let (store, _dir) = store().await;
        let v1 = store.push(&sample_record("example/agent", "1.0.0")).await.unwrap();
        let v2 = store.push(&sample_record("example/agent", "2.0.0")).await.unwrap();
        let resolved = store.resolve(&Reference::by_name("example/agent", None)).await.unwrap();
        assert_eq!(resolved, v2);
        assert_ne!(resolved, v1);
    }

    #[tokio::test]
    async fn exact_version_reference_resolves_to_that_version() {
        let (store, _dir) = store().await;
        let v1 = store.push(&sample_record("example/agent", "1.0.0")).await.unwrap();
        store.push(&sample_record("example/agent", "2.0.0")).await.unwrap();
        let resolved = store
            .resolve(&Reference::by_name("example/agent", Some("1.0.0".to_string())))
            .await
            .unwrap();
        assert_eq!(resolved, v1);
    }

    #[tokio::test]
    async fn pull_by_ref_with_mismatched_cid_is_rejected() {
        let (store, _dir) = store().await;
        store.push(&sample_record("example/agent", "1.0.0")).await.unwrap();
        let bogus = Cid::from_sha256([9u8; 32]);
        let reference_str = format!("example/agent:1.0.0@{}", bogus.to_encoded());
        assert!(store.pull_by_ref(&reference_str).await.is_err());
    }
}
