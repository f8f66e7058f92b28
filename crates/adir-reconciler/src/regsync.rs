//! The regsync task: claims pending sync jobs and pulls their advertised
//! records from a remote directory, one cycle per claimed job per pass.
//! Driving the remote goes through a config file a backing registry client
//! reads, rather than an in-process API, so any registry-client
//! implementation can be swapped in behind [`RemoteClient`] without this
//! task changing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adir_core::Cid;
use adir_db::SearchDb;
use adir_events::EventBus;
use adir_store::{Backend, ContentStore};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ReconcileError;
use crate::supervisor::{Task, TaskCtx};

/// The sync config descriptor written to disk for the backing registry
/// client to read: drives an external registry process via a config file
/// rather than a direct function call.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    pub remote_url: String,
    pub cid_filter: String,
    pub poll_interval_secs: u64,
    pub max_retries: u32,
    pub insecure: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Secrets {
    username: String,
    password: String,
}

/// Default credentials used when a remote doesn't negotiate its own —
/// supplied once from node config.
#[derive(Debug, Clone, Default)]
pub struct DefaultCredentials {
    pub username: String,
    pub password: String,
}

/// What the regsync task needs from a remote directory: the set of CIDs
/// it advertises, and the ability to fetch one's manifest and blobs.
/// Implementations talk whatever wire protocol the remote exposes; this
/// task only orchestrates claiming, filtering, and pulling.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn list_advertised_cids(&self, remote_url: &str) -> Result<Vec<String>, ReconcileError>;
    async fn negotiated_credentials(&self, remote_url: &str) -> Option<(String, String)>;
    /// Fetch the manifest for `digest` from the remote — never the local
    /// store, since the whole point of this task is to pull bytes the
    /// node doesn't already have.
    async fn fetch_manifest(&self, remote_url: &str, digest: &str) -> Result<adir_store::Manifest, ReconcileError>;
    /// Fetch a single blob (config or layer) by digest from the remote.
    async fn fetch_blob(&self, remote_url: &str, digest: &str) -> Result<Vec<u8>, ReconcileError>;
}

pub struct RegsyncTask<B: Backend + 'static, R: RemoteClient + 'static> {
    store: ContentStore<B>,
    db: Arc<dyn SearchDb>,
    bus: EventBus,
    remote: Arc<R>,
    working_dir: PathBuf,
    defaults: DefaultCredentials,
    pull_timeout: Duration,
    interval: Duration,
    claimant: String,
}

impl<B: Backend + 'static, R: RemoteClient + 'static> RegsyncTask<B, R> {
    pub fn new(
        store: ContentStore<B>,
        db: Arc<dyn SearchDb>,
        bus: EventBus,
        remote: Arc<R>,
        working_dir: impl Into<PathBuf>,
        defaults: DefaultCredentials,
        interval: Duration,
        claimant: impl Into<String>,
    ) -> Self {
        Self {
            store,
            db,
            bus,
            remote,
            working_dir: working_dir.into(),
            defaults,
            pull_timeout: Duration::from_secs(30),
            interval,
            claimant: claimant.into(),
        }
    }

    async fn write_sync_config(&self, job_id: &str, config: &SyncConfig) -> Result<(), ReconcileError> {
        let bytes = toml::to_string_pretty(config).map_err(|e| ReconcileError::Other(e.to_string()))?;
        let path = self.working_dir.join(format!("{job_id}.toml"));
        tokio::fs::write(&path, bytes).await.map_err(|e| ReconcileError::Other(format!("writing sync config: {e}")))
    }

    #[cfg(unix)]
    async fn write_secrets(&self, job_id: &str, username: &str, password: &str) -> Result<(), ReconcileError> {
        use std::os::unix::fs::PermissionsExt;
        let secrets = Secrets { username: username.to_string(), password: password.to_string() };
        let bytes = toml::to_string(&secrets).map_err(|e| ReconcileError::Other(e.to_string()))?;
        let path = self.working_dir.join(format!("{job_id}.secret"));
        tokio::fs::write(&path, bytes).await.map_err(|e| ReconcileError::Other(format!("writing secrets: {e}")))?;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| ReconcileError::Other(format!("setting secrets permissions: {e}")))
    }

    #[cfg(not(unix))]
    async fn write_secrets(&self, job_id: &str, username: &str, password: &str) -> Result<(), ReconcileError> {
        let secrets = Secrets { username: username.to_string(), password: password.to_string() };
        let bytes = toml::to_string(&secrets).map_err(|e| ReconcileError::Other(e.to_string()))?;
        let path = self.working_dir.join(format!("{job_id}.secret"));
        tokio::fs::write(&path, bytes).await.map_err(|e| ReconcileError::Other(format!("writing secrets: {e}")))
    }
}

#[async_trait]
impl<B: Backend + 'static, R: RemoteClient + 'static> Task for RegsyncTask<B, R> {
    fn name(&self) -> &str {
        "regsync"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, _ctx: &TaskCtx) -> Result<(), ReconcileError> {
        // 1. Claim a pending job; losing the race to another reconciler is
        //    a silent skip, not an error.
        let Some(job) = self.db.claim_pending_sync_job(&self.claimant).await? else {
            return Ok(());
        };
        info!(job_id = %job.id, remote = %job.remote_url, "claimed sync job");

        match self.sync_one(&job).await {
            Ok(pulled_count) => {
                self.db.complete_sync_job(&job.id, &self.claimant).await?;
                self.bus.emit_sync_completed(&job.id).await;
                info!(job_id = %job.id, pulled = pulled_count, "sync cycle complete");
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "sync cycle failed");
                self.db.fail_sync_job(&job.id, &self.claimant, &e.to_string()).await?;
                self.bus.emit_sync_failed(&job.id).await;
            }
        }
        Ok(())
    }
}

impl<B: Backend + 'static, R: RemoteClient + 'static> RegsyncTask<B, R> {
    async fn sync_one(&self, job: &adir_db::SyncJob) -> Result<usize, ReconcileError> {
        tokio::fs::create_dir_all(&self.working_dir)
            .await
            .map_err(|e| ReconcileError::Other(format!("creating sync working dir: {e}")))?;

        // 2. Credential negotiation, falling back to node-configured defaults.
        let (username, password) = match self.remote.negotiated_credentials(&job.remote_url).await {
            Some(creds) => creds,
            None => (self.defaults.username.clone(), self.defaults.password.clone()),
        };
        if !username.is_empty() {
            self.write_secrets(&job.id, &username, &password).await?;
        }

        // 3. Sync configuration file for the backing registry client.
        let config = SyncConfig {
            remote_url: job.remote_url.clone(),
            cid_filter: job.cid_filter.clone(),
            poll_interval_secs: self.interval.as_secs(),
            max_retries: 3,
            insecure: job.remote_url.starts_with("http://"),
        };
        self.write_sync_config(&job.id, &config).await?;

        // 4. Compile the CID-prefix filter.
        let filter = if job.cid_filter.is_empty() {
            None
        } else {
            Some(Regex::new(&job.cid_filter).map_err(|e| ReconcileError::Other(format!("invalid cid_filter: {e}")))?)
        };

        // 5. One pull cycle over the remote's advertised CIDs, bounded by the filter.
        // Each CID is fetched from the remote — never looked up in the local
        // store, which by construction doesn't have it yet — then ingested
        // locally the same way a peer pull-sync does.
        let advertised = self.remote.list_advertised_cids(&job.remote_url).await?;
        let mut pulled_count = 0usize;
        for digest in advertised {
            if let Some(filter) = &filter {
                if !filter.is_match(&digest) {
                    continue;
                }
            }
            if Cid::parse(&digest).is_none() {
                warn!(cid = %digest, "remote advertised a malformed CID, skipping");
                continue;
            };
            match tokio::time::timeout(self.pull_timeout, self.fetch_and_ingest(&job.remote_url, &digest)).await {
                Ok(Ok(cid)) => {
                    self.bus.emit_record_pulled(&cid).await;
                    pulled_count += 1;
                }
                Ok(Err(e)) => warn!(cid = %digest, error = %e, "pull failed, leaving for next cycle"),
                Err(_) => warn!(cid = %digest, "pull timed out, leaving for next cycle"),
            }
        }

        Ok(pulled_count)
    }

    /// Fetch one record's manifest and blobs from the remote, ingest them
    /// into the local store, then index the freshly-ingested record —
    /// the regsync counterpart of the peer layer's `pull_by_cid`.
    async fn fetch_and_ingest(&self, remote_url: &str, digest: &str) -> Result<Cid, ReconcileError> {
        let manifest = self.remote.fetch_manifest(remote_url, digest).await?;
        let config_bytes = self.remote.fetch_blob(remote_url, &manifest.config.digest).await?;
        let config: adir_store::RecordConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| ReconcileError::Other(format!("corrupt config blob from remote: {e}")))?;

        let mut layer_bytes = Vec::with_capacity(manifest.layers.len());
        for descriptor in &manifest.layers {
            let bytes = self.remote.fetch_blob(remote_url, &descriptor.digest).await?;
            layer_bytes.push((descriptor.clone(), bytes));
        }

        let cid = self.store.ingest(&config.name, &config.version, manifest, config_bytes, layer_bytes).await?;
        let pulled = self.store.pull(&cid).await?;
        self.db.insert_record_tx(&digest, &pulled.record).await?;
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use adir_core::{Domain, Record, Reference, Skill};
    use adir_db::SqliteSearchDb;
    use adir_store::fs::FsBackend;
    use chrono::Utc;

    use super::*;
    use crate::cancel::CancellationToken;

    fn sample_record(name: &str, version: &str) -> Record {
        Record {
            schema_version: "v1".into(),
            name: name.into(),
            version: version.into(),
            created_at: Utc::now(),
            authors: vec![],
            description: String::new(),
            skills: vec![Skill { category: "NLP".into(), class: "Text Completion".into() }],
            domains: vec![Domain { category: "finance".into(), class: "risk".into() }],
            locators: vec![],
            modules: vec![],
            signatures: vec![],
            annotations: Default::default(),
        }
    }

    /// Addresses a remote's own raw backend by digest, exactly the way
    /// `OciRemoteClient` addresses a foreign registry — never touches
    /// `self.store` of the task under test.
    struct FakeRemote {
        backend: Arc<FsBackend>,
        fetch_calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteClient for FakeRemote {
        async fn list_advertised_cids(&self, _remote_url: &str) -> Result<Vec<String>, ReconcileError> {
            let tags = self.backend.list_tags().await.map_err(|e| ReconcileError::Other(e.to_string()))?;
            Ok(tags.into_iter().map(|t| t.digest).collect())
        }

        async fn negotiated_credentials(&self, _remote_url: &str) -> Option<(String, String)> {
            None
        }

        async fn fetch_manifest(
            &self,
            _remote_url: &str,
            digest: &str,
        ) -> Result<adir_store::Manifest, ReconcileError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.backend.get_manifest(digest).await.map_err(|e| ReconcileError::Other(e.to_string()))
        }

        async fn fetch_blob(&self, _remote_url: &str, digest: &str) -> Result<Vec<u8>, ReconcileError> {
            self.backend.get_blob(digest).await.map_err(|e| ReconcileError::Other(e.to_string()))
        }
    }

    #[tokio::test]
    async fn regsync_pulls_from_the_remote_into_an_independent_local_store() {
        // Peer A: an independent node that already holds the record.
        let remote_dir = tempfile::tempdir().unwrap();
        let remote_store = ContentStore::new(FsBackend::open(remote_dir.path()).await.unwrap());
        remote_store.push(&sample_record("example/agent", "1.0.0")).await.unwrap();
        let remote_backend = Arc::new(FsBackend::open(remote_dir.path()).await.unwrap());

        // Peer B: this node, starting with nothing of its own.
        let local_dir = tempfile::tempdir().unwrap();
        let local_backend = FsBackend::open(local_dir.path()).await.unwrap();
        let local_store = ContentStore::new(local_backend);

        let db = Arc::new(SqliteSearchDb::in_memory().await.unwrap());
        let job = db.create_sync_job("peer-a://example", "").await.unwrap();

        let remote = Arc::new(FakeRemote { backend: remote_backend, fetch_calls: AtomicUsize::new(0) });
        let task = RegsyncTask::new(
            local_store.clone(),
            db.clone(),
            EventBus::new(),
            remote.clone(),
            local_dir.path().join("regsync"),
            DefaultCredentials::default(),
            Duration::from_secs(3600),
            "peer-b",
        );

        let ctx = TaskCtx { cancellation: CancellationToken::new() };
        task.run(&ctx).await.unwrap();

        let job = db.get_sync_job(&job.id).await.unwrap();
        assert_eq!(job.status, adir_core::SyncStatus::Completed);
        assert!(remote.fetch_calls.load(Ordering::SeqCst) > 0, "should have actually fetched from the remote");

        // The independent local store — never the remote — now has the record.
        let resolved = local_store.resolve(&Reference::by_name("example/agent", None)).await.unwrap();
        let pulled = local_store.pull(&resolved).await.unwrap();
        assert_eq!(pulled.record.name, "example/agent");
        assert_eq!(pulled.record.skills.len(), 1);
    }
}
