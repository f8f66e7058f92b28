//! Builds the combined tonic server over all five services: one shared
//! state, one listen address, one handle back to the caller.

use std::net::SocketAddr;
use std::sync::Arc;

use adir_db::SearchDb;
use adir_events::EventBus;
use adir_peer::{LocalSearch, PeerLayer};
use adir_resolver::NameResolver;
use adir_store::{Backend, ContentStore};
use tonic::transport::Server;
use tracing::info;

use adir_proto::events::events_service_server::EventsServiceServer;
use adir_proto::naming::naming_service_server::NamingServiceServer;
use adir_proto::routing::routing_service_server::RoutingServiceServer;
use adir_proto::store::store_service_server::StoreServiceServer;
use adir_proto::sync::sync_service_server::SyncServiceServer;

use crate::events::EventsServiceImpl;
use crate::naming::NamingServiceImpl;
use crate::routing::RoutingServiceImpl;
use crate::store::StoreServiceImpl;
use crate::sync::SyncServiceImpl;

pub struct RpcServerState<B: Backend + 'static, S: LocalSearch + 'static> {
    pub store: ContentStore<B>,
    pub db: Arc<dyn SearchDb>,
    pub bus: EventBus,
    pub peer: Arc<PeerLayer<B, S>>,
    pub resolver: NameResolver<B, S>,
}

/// Start the gRPC server and run it to completion (until `shutdown`
/// resolves).
pub async fn serve<B, S>(
    addr: SocketAddr,
    state: RpcServerState<B, S>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), tonic::transport::Error>
where
    B: Backend + 'static,
    S: LocalSearch + 'static,
{
    let store_svc = StoreServiceServer::new(StoreServiceImpl::new(state.store.clone(), state.bus.clone()));
    let routing_svc = RoutingServiceServer::new(RoutingServiceImpl::new(state.peer.clone()));
    let events_svc = EventsServiceServer::new(EventsServiceImpl::new(state.bus.clone()));
    let sync_svc = SyncServiceServer::new(SyncServiceImpl::new(state.db.clone()));
    let naming_svc = NamingServiceServer::new(NamingServiceImpl::new(state.resolver));

    info!(%addr, "gRPC server listening");

    Server::builder()
        .add_service(store_svc)
        .add_service(routing_svc)
        .add_service(events_svc)
        .add_service(sync_svc)
        .add_service(naming_svc)
        .serve_with_shutdown(addr, shutdown)
        .await
}
