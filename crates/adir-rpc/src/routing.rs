use std::collections::HashMap;
use std::pin::Pin;

use adir_peer::{ListRequest as PeerListRequest, LocalSearch, PeerLayer};
use adir_store::Backend;
use futures::Stream;
use tonic::{Request, Response, Status};

use adir_proto::routing::routing_service_server::RoutingService;
use adir_proto::routing::{ListItem, ListRequest};

pub struct RoutingServiceImpl<B: Backend + 'static, S: LocalSearch + 'static> {
    peer: std::sync::Arc<PeerLayer<B, S>>,
}

impl<B: Backend + 'static, S: LocalSearch + 'static> RoutingServiceImpl<B, S> {
    pub fn new(peer: std::sync::Arc<PeerLayer<B, S>>) -> Self {
        Self { peer }
    }
}

#[tonic::async_trait]
impl<B: Backend + 'static, S: LocalSearch + 'static> RoutingService for RoutingServiceImpl<B, S> {
    type ListStream = Pin<Box<dyn Stream<Item = Result<ListItem, Status>> + Send + 'static>>;

    async fn list(&self, request: Request<ListRequest>) -> Result<Response<Self::ListStream>, Status> {
        let req = request.into_inner();
        let result = self
            .peer
            .list(PeerListRequest {
                labels: req.labels,
                network: req.network,
                max_hops: req.max_hops,
                allowed: req.allowed_peers,
                blocked: req.blocked_peers,
            })
            .await;

        let items: Vec<Result<ListItem, Status>> = result
            .matches
            .into_iter()
            .map(|m| {
                let mut label_counts = HashMap::new();
                for label in &m.labels {
                    *label_counts.entry(label.clone()).or_insert(0u64) += 1;
                }
                Ok(ListItem {
                    peer: m.peer,
                    labels: m.labels,
                    cid: m.cid,
                    name: m.name,
                    version: m.version,
                    label_counts,
                    annotations: HashMap::new(),
                })
            })
            .collect();

        Ok(Response::new(Box::pin(futures::stream::iter(items))))
    }
}
