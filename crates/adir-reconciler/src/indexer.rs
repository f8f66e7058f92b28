//! The indexer task: snapshot-diffs the store's tag list against a local
//! JSON snapshot file and reconciles `adir-db` to match, so the database
//! never silently diverges from what the store actually holds — not even
//! across process restarts, since the snapshot persists to disk.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adir_core::Cid;
use adir_db::SearchDb;
use adir_events::EventBus;
use adir_store::{Backend, ContentStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ReconcileError;
use crate::supervisor::{Task, TaskCtx};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    cids: BTreeSet<String>,
}

pub struct IndexerTask<B: Backend + 'static> {
    store: ContentStore<B>,
    db: Arc<dyn SearchDb>,
    bus: EventBus,
    snapshot_path: PathBuf,
    interval: Duration,
}

impl<B: Backend + 'static> IndexerTask<B> {
    pub fn new(
        store: ContentStore<B>,
        db: Arc<dyn SearchDb>,
        bus: EventBus,
        data_dir: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self { store, db, bus, snapshot_path: data_dir.into().join("snapshot.json"), interval }
    }

    async fn load_snapshot(&self) -> Snapshot {
        match tokio::fs::read(&self.snapshot_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Snapshot::default(),
        }
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ReconcileError> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| ReconcileError::Other(format!("encoding snapshot: {e}")))?;
        tokio::fs::write(&self.snapshot_path, bytes)
            .await
            .map_err(|e| ReconcileError::Other(format!("writing snapshot: {e}")))
    }
}

#[async_trait]
impl<B: Backend + 'static> Task for IndexerTask<B> {
    fn name(&self) -> &str {
        "indexer"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, _ctx: &TaskCtx) -> Result<(), ReconcileError> {
        // 1. Snapshot the store's current tags.
        let tags = self.store.tags().await?;
        let live: BTreeSet<String> = tags.iter().map(|t| t.digest.clone()).collect();

        // 2. Diff against the last on-disk snapshot.
        let previous = self.load_snapshot().await;
        let new_cids: Vec<&String> = live.difference(&previous.cids).collect();
        let vanished: Vec<&String> = previous.cids.difference(&live).collect();

        // 3. Insert new CIDs transactionally, logging and continuing past
        //    individual failures rather than aborting the whole pass.
        let mut committed = previous.cids.clone();
        for digest in new_cids {
            match self.index_one(digest).await {
                Ok(labels) => {
                    committed.insert(digest.clone());
                    // Distinct from the write-path `RecordPushed`: this
                    // marks the moment the record became searchable in the
                    // search database, which may lag the push by up to one
                    // indexer interval.
                    if let Some(cid) = Cid::parse(digest) {
                        self.bus.emit_record_indexed(&cid, labels).await;
                    }
                }
                Err(e) => error!(cid = %digest, error = %e, "failed to index record, will retry next pass"),
            }
        }

        // 4. Delete rows for vanished CIDs.
        for digest in vanished {
            match self.db.delete_record_tx(digest).await {
                Ok(()) => {
                    committed.remove(digest);
                }
                Err(e) => error!(cid = %digest, error = %e, "failed to delete vanished record from index"),
            }
        }

        // 5. Persist the new snapshot, but only over CIDs that actually committed.
        self.save_snapshot(&Snapshot { cids: committed }).await?;

        info!(indexed = live.len(), "indexer pass complete");
        Ok(())
    }
}

impl<B: Backend + 'static> IndexerTask<B> {
    async fn index_one(&self, digest: &str) -> Result<Vec<String>, ReconcileError> {
        let cid = Cid::parse(digest).ok_or_else(|| ReconcileError::Other(format!("malformed digest {digest}")))?;
        let pulled = self.store.pull(&cid).await?;
        let labels = pulled.record.event_labels();
        self.db.insert_record_tx(digest, &pulled.record).await?;
        Ok(labels)
    }
}
