//! adir-node — the Agent Directory node binary.
//!
//! Startup sequence:
//!   1. Parse CLI args + layered TOML/env config
//!   2. Open/migrate the search database, open the content store
//!   3. Build the event bus
//!   4. Start the peer layer
//!   5. Start the reconciler supervisor (indexer, regsync, naming)
//!   6. Start the gRPC server and the readiness HTTP server
//!   7. Wait for SIGINT/SIGTERM/SIGHUP, then shut everything down

mod announcer;
mod candidates;
mod config;
mod remote;
mod search;

use std::path::PathBuf;
use std::sync::Arc;

use adir_db::SqliteSearchDb;
use adir_events::EventBus;
use adir_peer::PeerLayer;
use adir_reconciler::{IndexerTask, NameVerifyTask, RegsyncTask, Supervisor, Task};
use adir_resolver::NameResolver;
use adir_store::fs::FsBackend;
use adir_store::ContentStore;
use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::candidates::StoreBackedCandidateSource;
use crate::config::NodeConfig;
use crate::remote::OciRemoteClient;
use crate::search::DbLocalSearch;

#[derive(Parser, Debug)]
#[command(name = "adir-node", version, about = "Agent Directory node — content store, search index, and peer layer")]
struct Args {
    /// Path to a TOML config file; missing is not an error, defaults apply.
    #[arg(long, default_value = "adir.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,adir=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = NodeConfig::load(Some(&args.config)).context("loading node configuration")?;
    info!(listen_address = %config.listen_address, "adir-node starting");

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    // ── Search database ──────────────────────────────────────────────────
    let db_path = config.data_dir.join(&config.db.database);
    let db: Arc<dyn adir_db::SearchDb> =
        Arc::new(SqliteSearchDb::open(&db_path).await.context("opening search database")?);

    // ── Content store ────────────────────────────────────────────────────
    let store_root = config.data_dir.join("store");
    let backend = FsBackend::open(&store_root).await.context("opening content store")?;
    let store = ContentStore::new(backend);
    let readiness_backend = Arc::new(FsBackend::open(&store_root).await.context("opening readiness probe backend")?);

    // ── Event bus ─────────────────────────────────────────────────────────
    let bus = EventBus::new();

    // ── Peer layer ────────────────────────────────────────────────────────
    let search = Arc::new(DbLocalSearch::new(db.clone()));
    let peer = PeerLayer::start(config.peer_config(), store.clone(), bus.clone(), search)
        .map_err(|e| anyhow::anyhow!("starting peer layer: {e}"))?;
    info!(peer_id = %peer.local_peer_id(), "peer layer ready");

    // A pushed or deleted record publishes/unpublishes and
    // announces/withdraws itself on the peer network without any
    // separate caller action — see `announcer`.
    let announcer_task = tokio::spawn(crate::announcer::run(bus.clone(), db.clone(), peer.clone()));

    // ── Reconciler supervisor ────────────────────────────────────────────
    let candidate_source = Arc::new(StoreBackedCandidateSource::new(store.clone(), db.clone()));
    let remote_client = Arc::new(OciRemoteClient::new());

    let indexer = Arc::new(IndexerTask::new(
        store.clone(),
        db.clone(),
        bus.clone(),
        config.data_dir.clone(),
        std::time::Duration::from_secs(config.reconciler.indexer.interval_secs),
    ));
    let regsync = Arc::new(RegsyncTask::new(
        store.clone(),
        db.clone(),
        bus.clone(),
        remote_client,
        config.data_dir.join("regsync"),
        adir_reconciler::DefaultCredentials::default(),
        std::time::Duration::from_secs(config.reconciler.regsync.interval_secs),
        peer.local_peer_id(),
    ));
    let naming = Arc::new(NameVerifyTask::new(
        db.clone(),
        candidate_source,
        config.reconciler.naming.allow_insecure,
        config.naming_interval(),
        config.naming_ttl(),
        config.naming_record_timeout(),
        config.reconciler.naming.enabled,
    ));

    let tasks: Vec<Arc<dyn Task>> =
        vec![indexer as Arc<dyn Task>, regsync as Arc<dyn Task>, naming as Arc<dyn Task>];
    let supervisor = Supervisor::start(tasks);

    // ── Naming resolver ───────────────────────────────────────────────────
    let resolver = NameResolver::new(store.clone(), db.clone(), Some(peer.clone()));

    // ── gRPC + readiness servers ──────────────────────────────────────────
    let rpc_state = adir_rpc::RpcServerState { store, db: db.clone(), bus, peer, resolver };

    let shutdown = shutdown_signal();
    let rpc_addr = config.listen_address;
    let rpc_task = tokio::spawn(async move {
        if let Err(e) = adir_rpc::serve(rpc_addr, rpc_state, shutdown).await {
            warn!(error = %e, "gRPC server exited with an error");
        }
    });

    let health_addr = std::net::SocketAddr::new(config.listen_address.ip(), config.health_port);
    let readiness_task = tokio::spawn(async move {
        if let Err(e) = adir_reconciler::readiness::serve(health_addr, db, readiness_backend).await {
            warn!(error = %e, "readiness server exited with an error");
        }
    });

    info!("node ready");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping reconciler tasks");
    supervisor.stop().await;
    rpc_task.abort();
    readiness_task.abort();
    announcer_task.abort();

    Ok(())
}

/// Resolves once a shutdown signal fires — handed to the gRPC server as
/// its `serve_with_shutdown` future.
async fn shutdown_signal() {
    wait_for_shutdown_signal().await;
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("installing SIGHUP handler");

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sighup.recv() => info!("received SIGHUP"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}
