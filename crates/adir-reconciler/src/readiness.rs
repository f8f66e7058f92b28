//! A small `axum` readiness server: `/healthz` always answers 200 while
//! the process is up, `/readyz` only answers 200 once every dependency
//! this node needs reports ready within its own timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use adir_db::SearchDb;
use adir_store::Backend;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::info;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

struct ReadinessState<B: Backend + 'static> {
    db: Arc<dyn SearchDb>,
    backend: Arc<B>,
}

pub async fn serve<B: Backend + 'static>(
    addr: SocketAddr,
    db: Arc<dyn SearchDb>,
    backend: Arc<B>,
) -> std::io::Result<()> {
    let state = Arc::new(ReadinessState { db, backend });
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<B>))
        .with_state(state);

    info!(%addr, "readiness server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn readyz<B: Backend + 'static>(State(state): State<Arc<ReadinessState<B>>>) -> StatusCode {
    let db_ready = state.db.is_ready(READY_TIMEOUT).await;
    let backend_ready = state.backend.ready(READY_TIMEOUT).await;
    if db_ready && backend_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
