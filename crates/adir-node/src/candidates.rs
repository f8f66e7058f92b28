//! Enumerates records due for name (re-)verification: every indexed CID
//! whose cached verdict has expired (or never existed), filtered down to
//! the ones that are actually signed and carry a verifiable `host/path`
//! name — everything else has nothing for the naming task to check.

use std::sync::Arc;

use adir_db::SearchDb;
use adir_reconciler::{CandidateSource, ReconcileError, VerificationCandidate};
use adir_store::{Backend, ContentStore};
use async_trait::async_trait;
use chrono::Utc;

pub struct StoreBackedCandidateSource<B: Backend + 'static> {
    store: ContentStore<B>,
    db: Arc<dyn SearchDb>,
}

impl<B: Backend + 'static> StoreBackedCandidateSource<B> {
    pub fn new(store: ContentStore<B>, db: Arc<dyn SearchDb>) -> Self {
        Self { store, db }
    }
}

#[async_trait]
impl<B: Backend + 'static> CandidateSource for StoreBackedCandidateSource<B> {
    async fn due_candidates(&self) -> Result<Vec<VerificationCandidate>, ReconcileError> {
        let cids = self.db.list_all_cids().await?;
        let mut due = Vec::new();

        for cid in cids {
            let indexed = match self.db.get_record(&cid).await? {
                Some(r) => r,
                None => continue,
            };

            let verdict = self.db.lookup_name_verification(&cid, &indexed.name).await?;
            let still_fresh = verdict.is_some_and(|v| v.expires_at > Utc::now());
            if still_fresh {
                continue;
            }

            let Some(parsed_cid) = adir_core::Cid::parse(&cid) else { continue };
            let pulled = match self.store.pull(&parsed_cid).await {
                Ok(pulled) => pulled,
                Err(_) => continue,
            };
            if !pulled.record.is_signed() || pulled.record.authority_host().is_none() {
                continue;
            }

            let signature_keys = pulled.record.signatures.iter().map(|s| s.key_or_cert.clone()).collect();
            due.push(VerificationCandidate { cid, name: pulled.record.name, signature_keys });
        }

        Ok(due)
    }
}
