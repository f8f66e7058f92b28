//! The naming resolver: turns a [`Reference`] into a CID, checking the
//! local store first, falling back to the peer layer for a name it
//! doesn't carry a tag for, and enforcing the digest-mismatch-is-fatal
//! rule whenever a reference pins both a name and a CID.

use std::sync::Arc;

use adir_core::{Cid, Reference, VerificationStatus};
use adir_db::SearchDb;
use adir_peer::{ListRequest, LocalSearch, PeerLayer};
use adir_store::{Backend, ContentStore};
use tracing::debug;

use crate::error::{ResolverError, ResolverResult};

/// The label namespace convention a name lookup is flooded under — the
/// same `/skills/...`-shaped path convention the indexer uses for
/// skills, just rooted at `/name/` instead.
fn name_label(name: &str) -> String {
    format!("/name/{name}")
}

pub struct ResolveOptions {
    pub allow_network: bool,
    pub max_hops: Option<u32>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { allow_network: true, max_hops: None }
    }
}

/// The outcome of a [`NameResolver::resolve`] call: the CID plus whether
/// the name's authority key checked out, plus any other CIDs discovered
/// under the same bare name (the "ambiguous: return both, flag it"
/// policy for a name that resolves to more than one CID across peers).
pub struct ResolvedRecord {
    pub cid: Cid,
    pub verified: bool,
    pub ambiguous_alternatives: Vec<Cid>,
}

pub struct NameResolver<B: Backend + 'static, S: LocalSearch + 'static> {
    store: ContentStore<B>,
    db: Arc<dyn SearchDb>,
    peer: Option<Arc<PeerLayer<B, S>>>,
}

impl<B: Backend + 'static, S: LocalSearch + 'static> NameResolver<B, S> {
    pub fn new(store: ContentStore<B>, db: Arc<dyn SearchDb>, peer: Option<Arc<PeerLayer<B, S>>>) -> Self {
        Self { store, db, peer }
    }

    pub async fn resolve(&self, reference: &Reference, opts: &ResolveOptions) -> ResolverResult<ResolvedRecord> {
        // 1. A bare CID with no name: existence-check it and return as-is.
        // There is no name claim here, so there is nothing to verify.
        if reference.name.is_none() {
            let cid = reference.cid.clone().ok_or(ResolverError::EmptyReference)?;
            self.store.pull(&cid).await?;
            return Ok(ResolvedRecord { cid, verified: true, ambiguous_alternatives: Vec::new() });
        }

        let name = reference.name.as_deref().expect("checked above");

        // 2. Local tag resolution.
        if let Ok(cid) = self.store.resolve(reference).await {
            self.check_digest(reference, &cid)?;
            let verified = self.is_verified(&cid, name).await;
            return Ok(ResolvedRecord { cid, verified, ambiguous_alternatives: Vec::new() });
        }

        // 3. Ask peers for records whose name matches, subject to the
        // name-verification gate: unverified names are still reported,
        // but `verified` tells the caller not to trust the claim blindly.
        if opts.allow_network {
            if let Some(peer) = &self.peer {
                let result = peer
                    .list(ListRequest {
                        labels: vec![name_label(name)],
                        network: true,
                        max_hops: opts.max_hops,
                        allowed: Vec::new(),
                        blocked: Vec::new(),
                    })
                    .await;

                let mut candidates: Vec<Cid> = result
                    .matches
                    .into_iter()
                    .filter(|m| m.name == name)
                    .filter_map(|m| Cid::parse(&m.cid))
                    .collect();
                candidates.dedup();

                if !candidates.is_empty() {
                    // Prefer the first candidate whose authority key checks
                    // out; only fall back to first-seen order when none of
                    // them verify.
                    let mut chosen_idx = 0;
                    let mut chosen_verified = false;
                    for (idx, candidate) in candidates.iter().enumerate() {
                        if self.is_verified(candidate, name).await {
                            chosen_idx = idx;
                            chosen_verified = true;
                            break;
                        }
                    }

                    let primary = candidates.remove(chosen_idx);
                    self.check_digest(reference, &primary)?;
                    if !candidates.is_empty() {
                        debug!(name, count = candidates.len(), "name resolved ambiguously across peers");
                    }
                    return Ok(ResolvedRecord {
                        cid: primary,
                        verified: chosen_verified,
                        ambiguous_alternatives: candidates,
                    });
                }
            }
        }

        Err(ResolverError::UnknownName(name.to_string()))
    }

    /// Step 4: if the reference pinned both a name and a CID, the
    /// resolved object's digest must equal it exactly.
    fn check_digest(&self, reference: &Reference, resolved: &Cid) -> ResolverResult<()> {
        if let Some(want) = &reference.cid {
            if want != resolved {
                return Err(ResolverError::DigestMismatch { expected: want.clone(), actual: resolved.clone() });
            }
        }
        Ok(())
    }

    async fn is_verified(&self, cid: &Cid, name: &str) -> bool {
        match self.db.lookup_name_verification(&cid.to_encoded(), name).await {
            Ok(Some(row)) => row.status == VerificationStatus::Verified && row.expires_at > chrono::Utc::now(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adir_core::{Record, Skill};
    use adir_db::SqliteSearchDb;
    use adir_store::fs::FsBackend;
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

    async fn resolver() -> (NameResolver<FsBackend, NoopSearch>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        let store = ContentStore::new(backend);
        let db: Arc<dyn SearchDb> = Arc::new(SqliteSearchDb::in_memory().await.unwrap());
        (NameResolver::new(store, db, None), dir)
    }

    struct NoopSearch;

    #[async_trait::async_trait]
    impl LocalSearch for NoopSearch {
        async fn match_labels(&self, _labels: &[String]) -> Vec<adir_peer::LabelMatch> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn resolves_locally_pushed_name() {
        let (resolver, _dir) = resolver().await;
        resolver.store.push(&sample_record("example/agent", "1.0.0")).await.unwrap();
        let reference = Reference::by_name("example/agent", Some("1.0.0".to_string()));
        let resolved = resolver.resolve(&reference, &ResolveOptions::default()).await.unwrap();
        assert!(resolved.ambiguous_alternatives.is_empty());
    }

    #[tokio::test]
    async fn unknown_name_without_peer_layer_is_an_error() {
        let (resolver, _dir) = resolver().await;
        let reference = Reference::by_name("nobody/here", None);
        let err = resolver.resolve(&reference, &ResolveOptions::default()).await.unwrap_err();
        assert!(matches!(err, ResolverError::UnknownName(_)));
    }

    #[tokio::test]
    async fn bare_cid_requires_existence_in_store() {
        let (resolver, _dir) = resolver().await;
        let bogus = Cid::from_sha256([3u8; 32]);
        let reference = Reference::by_cid(bogus);
        assert!(resolver.resolve(&reference, &ResolveOptions::default()).await.is_err());
    }
}
