//! [`PeerLayer`]: the public surface the rest of the workspace talks to.
//! Wires the libp2p network task, the local routing/response tables, a
//! pluggable local-match search, and the content store together into
//! provider announcement, BFS label search, and pull-sync.

use std::sync::Arc;

use adir_core::Cid;
use adir_events::EventBus;
use adir_store::{Backend, ContentStore};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::bfs::{network_search, SearchRequest};
use crate::config::PeerConfig;
use crate::error::{PeerError, PeerResult};
use crate::message::{GossipMessage, LabelMatch, PullRequest, PullResponse};
use crate::network::{NetworkEvent, PeerHandle, PeerNetwork};
use crate::routing::{ResponseRouter, RoutingTable};

/// Looks up which of the node's own records match a label query. Kept as
/// a trait rather than a hard dependency on `adir-db` so the peer layer
/// doesn't need to know how the search index is implemented.
#[async_trait]
pub trait LocalSearch: Send + Sync {
    async fn match_labels(&self, labels: &[String]) -> Vec<LabelMatch>;
}

pub struct ListRequest {
    pub labels: Vec<String>,
    pub network: bool,
    pub max_hops: Option<u32>,
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
}

pub struct ListResult {
    pub matches: Vec<LabelMatch>,
}

pub struct PeerLayer<B: Backend + 'static, S: LocalSearch + 'static> {
    handle: Arc<PeerHandle>,
    routing: RoutingTable,
    router: ResponseRouter,
    store: ContentStore<B>,
    bus: EventBus,
    search: Arc<S>,
    config: PeerConfig,
}

impl<B: Backend + 'static, S: LocalSearch + 'static> PeerLayer<B, S> {
    /// Build the network, spawn its event loop and the layer's own
    /// dispatcher, and return a ready-to-use layer.
    pub fn start(
        config: PeerConfig,
        store: ContentStore<B>,
        bus: EventBus,
        search: Arc<S>,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let routing = RoutingTable::new();
        let router = ResponseRouter::new();
        let (network, handle) = PeerNetwork::new(&config, routing.clone())?;
        tokio::spawn(network.run());

        let layer = Arc::new(Self {
            handle: Arc::new(handle),
            routing,
            router,
            store,
            bus,
            search,
            config,
        });
        tokio::spawn(layer.clone().run_dispatcher());
        Ok(layer)
    }

    pub fn local_peer_id(&self) -> String {
        self.handle.local_peer_id.to_string()
    }

    /// Start providing `cid` to the network and emit `RECORD_PUSHED`'s
    /// peer-layer counterpart via the gossip announcement.
    pub async fn announce(&self, cid: &Cid) {
        let digest = cid.to_encoded();
        self.handle.start_providing(&digest).await;
        self.routing.add_provider(&digest, &self.local_peer_id()).await;
        self.handle.publish(GossipMessage::ProviderAnnounce { cid: digest }).await;
    }

    pub async fn withdraw(&self, cid: &Cid) {
        let digest = cid.to_encoded();
        self.handle.stop_providing(&digest).await;
        self.routing.remove_provider(&digest, &self.local_peer_id()).await;
        self.handle.publish(GossipMessage::ProviderWithdraw { cid: digest }).await;
    }

    /// `List(request)`: local mode restricts to this node's own routing
    /// table plus its own search index; network mode floods a BFS up to
    /// `max_hops`, merging in local matches too.
    pub async fn list(&self, request: ListRequest) -> ListResult {
        let mut matches = self.search.match_labels(&request.labels).await;

        if request.network {
            let max_hops = request.max_hops.unwrap_or(self.config.default_max_hops);
            let network_matches = network_search(
                &self.handle,
                &self.router,
                &self.local_peer_id(),
                SearchRequest {
                    labels: request.labels,
                    max_hops,
                    allowed: request.allowed,
                    blocked: request.blocked,
                    hop_timeout: self.config.hop_timeout,
                },
            )
            .await;
            matches.extend(network_matches);
        }

        // Ties between equally-ranked results break by lexicographic
        // peer-id compare, so output order is stable across runs.
        matches.sort_by(|a, b| a.cid.cmp(&b.cid).then_with(|| a.peer.cmp(&b.peer)));
        matches.dedup_by(|a, b| a.cid == b.cid && a.peer == b.peer);
        ListResult { matches }
    }

    /// Resolve a CID to a provider (network lookup if the routing table
    /// has nothing local), pull its manifest and blobs over the
    /// request-response protocol, verify, and write into the local store.
    pub async fn pull_by_cid(&self, cid: &Cid, name: &str, version: &str) -> PeerResult<Cid> {
        let digest = cid.to_encoded();
        let mut providers = self.routing.providers(&digest).await;
        if providers.is_empty() {
            let peer_ids = self.handle.get_providers(&digest).await;
            providers = peer_ids.into_iter().map(|p| p.to_string()).collect();
            providers.sort();
        }

        let local_id = self.local_peer_id();
        let provider = providers
            .into_iter()
            .find(|p| p != &local_id)
            .ok_or_else(|| PeerError::NoProvider(digest.clone()))?;

        let peer_id: libp2p::PeerId =
            provider.parse().map_err(|_| PeerError::Malformed(format!("bad peer id {provider}")))?;

        let response = self
            .handle
            .send_pull_request(peer_id, PullRequest { cid: digest.clone() })
            .await?;

        match response {
            PullResponse::NotFound => Err(PeerError::NoProvider(digest)),
            PullResponse::Found { manifest, config_bytes, layers, .. } => {
                let ingested = self.store.ingest(name, version, manifest, config_bytes, layers).await?;
                if ingested != *cid {
                    warn!(expected = %cid, actual = %ingested, "pulled record's recomputed CID differs from requested CID");
                }
                self.bus.emit_record_pulled(&ingested).await;
                Ok(ingested)
            }
        }
    }

    async fn run_dispatcher(self: Arc<Self>) {
        loop {
            match self.handle.recv().await {
                Some(NetworkEvent::Gossip(GossipMessage::LabelQuery {
                    query_id,
                    labels,
                    allowed,
                    blocked,
                    ..
                })) => {
                    let local_id = self.local_peer_id();
                    if blocked.contains(&local_id) {
                        continue;
                    }
                    if !allowed.is_empty() && !allowed.contains(&local_id) {
                        continue;
                    }
                    let matches = self.search.match_labels(&labels).await;
                    if !matches.is_empty() {
                        self.handle
                            .publish(GossipMessage::LabelResponse { query_id, peer: local_id, matches })
                            .await;
                    }
                }
                Some(NetworkEvent::Gossip(GossipMessage::LabelResponse { query_id, matches, .. })) => {
                    for m in matches {
                        self.router.route(&query_id, m).await;
                    }
                }
                Some(NetworkEvent::Gossip(GossipMessage::ProviderAnnounce { .. }))
                | Some(NetworkEvent::Gossip(GossipMessage::ProviderWithdraw { .. })) => {
                    // Routing-table side effects already applied inside
                    // the network task itself.
                }
                Some(NetworkEvent::PullRequested { request, channel }) => {
                    let response = self.answer_pull(&request).await;
                    self.handle.respond_pull(channel, response).await;
                }
                None => {
                    info!("peer network task ended, dispatcher stopping");
                    break;
                }
            }
        }
    }

    async fn answer_pull(&self, request: &PullRequest) -> PullResponse {
        let Some(cid) = Cid::parse(&request.cid) else {
            return PullResponse::NotFound;
        };
        match self.store.pull(&cid).await {
            Ok(pulled) => {
                let split = match adir_store::manifest::split(&pulled.record) {
                    Ok(split) => split,
                    Err(_) => return PullResponse::NotFound,
                };
                PullResponse::Found {
                    name: pulled.record.name,
                    version: pulled.record.version,
                    manifest: pulled.manifest,
                    config_bytes: split.config_bytes,
                    layers: split.layer_bytes,
                }
            }
            Err(_) => PullResponse::NotFound,
        }
    }
}
