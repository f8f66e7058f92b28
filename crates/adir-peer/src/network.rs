//! libp2p networking layer, built on the same behaviour-composition
//! pattern as the upstream DAG node's p2p crate: gossipsub for flooded
//! traffic, Kademlia for provider discovery and bootstrap, identify and
//! ping for connection metadata — plus a request-response protocol for
//! the direct manifest-and-blobs pull the gossip layer never carries.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use futures::StreamExt;
use libp2p::{
    gossipsub, identify, kad, noise, ping, request_response, tcp, yamux,
    swarm::SwarmEvent,
    Multiaddr, PeerId, StreamProtocol, Swarm,
};
use libp2p_swarm::NetworkBehaviour;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::PeerConfig;
use crate::error::{PeerError, PeerResult};
use crate::message::{GossipMessage, PullRequest, PullResponse};
use crate::routing::RoutingTable;

#[derive(NetworkBehaviour)]
pub struct AdirBehaviour {
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub gossipsub: gossipsub::Behaviour,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    pub pull: request_response::cbor::Behaviour<PullRequest, PullResponse>,
}

/// An event surfaced to the application above the network task.
pub enum NetworkEvent {
    Gossip(GossipMessage),
    PullRequested { request: PullRequest, channel: request_response::ResponseChannel<PullResponse> },
}

enum Command {
    Publish(GossipMessage),
    StartProviding(String),
    StopProviding(String),
    GetProviders { cid: String, reply: oneshot::Sender<Vec<PeerId>> },
    SendPullRequest { peer: PeerId, request: PullRequest, reply: oneshot::Sender<PeerResult<PullResponse>> },
    RespondPull { channel: request_response::ResponseChannel<PullResponse>, response: PullResponse },
}

/// Application-facing handle returned from [`PeerNetwork::new`].
pub struct PeerHandle {
    pub local_peer_id: PeerId,
    command_tx: mpsc::Sender<Command>,
    inbound_rx: Mutex<mpsc::Receiver<NetworkEvent>>,
}

impl PeerHandle {
    pub async fn publish(&self, msg: GossipMessage) {
        let _ = self.command_tx.send(Command::Publish(msg)).await;
    }

    pub async fn start_providing(&self, cid: &str) {
        let _ = self.command_tx.send(Command::StartProviding(cid.to_string())).await;
    }

    pub async fn stop_providing(&self, cid: &str) {
        let _ = self.command_tx.send(Command::StopProviding(cid.to_string())).await;
    }

    pub async fn get_providers(&self, cid: &str) -> Vec<PeerId> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(Command::GetProviders { cid: cid.to_string(), reply: reply_tx }).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub async fn send_pull_request(&self, peer: PeerId, request: PullRequest) -> PeerResult<PullResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::SendPullRequest { peer, request, reply: reply_tx })
            .await
            .map_err(|_| PeerError::NetworkDown("network task is gone".into()))?;
        reply_rx.await.map_err(|_| PeerError::NetworkDown("network task dropped the reply".into()))?
    }

    pub async fn respond_pull(
        &self,
        channel: request_response::ResponseChannel<PullResponse>,
        response: PullResponse,
    ) {
        let _ = self.command_tx.send(Command::RespondPull { channel, response }).await;
    }

    /// Receive the next event from the swarm. Only one caller should poll
    /// this at a time; the lock just makes that safe rather than exclusive.
    pub async fn recv(&self) -> Option<NetworkEvent> {
        self.inbound_rx.lock().await.recv().await
    }
}

/// Owns the libp2p [`Swarm`]. Spawn [`PeerNetwork::run`] in its own task.
pub struct PeerNetwork {
    swarm: Swarm<AdirBehaviour>,
    topic: gossipsub::IdentTopic,
    routing: RoutingTable,
    command_rx: mpsc::Receiver<Command>,
    inbound_tx: mpsc::Sender<NetworkEvent>,
    pending_providers: HashMap<kad::QueryId, (Vec<PeerId>, oneshot::Sender<Vec<PeerId>>)>,
    pending_pull: HashMap<request_response::OutboundRequestId, oneshot::Sender<PeerResult<PullResponse>>>,
}

impl PeerNetwork {
    pub fn new(
        config: &PeerConfig,
        routing: RoutingTable,
    ) -> Result<(Self, PeerHandle), Box<dyn std::error::Error + Send + Sync>> {
        let topic = gossipsub::IdentTopic::new(&config.topic);
        let pull_protocol = StreamProtocol::new("/agent-directory/pull/1");

        let mut swarm = libp2p::SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)?
            .with_behaviour(|key: &libp2p::identity::Keypair| {
                let message_id_fn = |msg: &gossipsub::Message| {
                    let mut s = DefaultHasher::new();
                    msg.data.hash(&mut s);
                    gossipsub::MessageId::from(s.finish().to_string())
                };

                let gossipsub_config = gossipsub::ConfigBuilder::default()
                    .heartbeat_interval(Duration::from_secs(1))
                    .validation_mode(gossipsub::ValidationMode::Strict)
                    .message_id_fn(message_id_fn)
                    .build()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let gossipsub = gossipsub::Behaviour::new(
                    gossipsub::MessageAuthenticity::Signed(key.clone()),
                    gossipsub_config,
                )
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let store = kad::store::MemoryStore::new(key.public().to_peer_id());
                let kademlia = kad::Behaviour::new(key.public().to_peer_id(), store);

                let identify = identify::Behaviour::new(identify::Config::new(
                    config.protocol_version.clone(),
                    key.public(),
                ));

                let ping = ping::Behaviour::default();

                let pull = request_response::cbor::Behaviour::new(
                    [(pull_protocol.clone(), request_response::ProtocolSupport::Full)],
                    request_response::Config::default(),
                );

                Ok(AdirBehaviour { kademlia, gossipsub, identify, ping, pull })
            })?
            .build();

        swarm.behaviour_mut().gossipsub.subscribe(&topic)?;

        let listen_addr: Multiaddr = config.listen_addr.parse()?;
        swarm.listen_on(listen_addr)?;

        for addr_str in &config.bootstrap_peers {
            if let Ok(addr) = addr_str.parse::<Multiaddr>() {
                if let Some(libp2p::multiaddr::Protocol::P2p(peer_id)) = addr.iter().last() {
                    swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
                    swarm.dial(addr.clone())?;
                    debug!(peer = %peer_id, "dialing bootstrap peer");
                }
            }
        }

        let local_peer_id = *swarm.local_peer_id();
        let (command_tx, command_rx) = mpsc::channel(256);
        let (inbound_tx, inbound_rx) = mpsc::channel(256);

        let network = PeerNetwork {
            swarm,
            topic,
            routing,
            command_rx,
            inbound_tx,
            pending_providers: HashMap::new(),
            pending_pull: HashMap::new(),
        };
        let handle = PeerHandle { local_peer_id, command_tx, inbound_rx: Mutex::new(inbound_rx) };

        Ok((network, handle))
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }
                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event).await;
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Publish(msg) => {
                if let Err(e) = self.swarm.behaviour_mut().gossipsub.publish(self.topic.clone(), msg.to_bytes()) {
                    warn!(error = %e, "gossipsub publish failed");
                }
            }
            Command::StartProviding(cid) => {
                let key = kad::RecordKey::new(&cid.as_bytes());
                if let Err(e) = self.swarm.behaviour_mut().kademlia.start_providing(key) {
                    warn!(error = %e, cid, "failed to start providing");
                }
            }
            Command::StopProviding(cid) => {
                let key = kad::RecordKey::new(&cid.as_bytes());
                self.swarm.behaviour_mut().kademlia.stop_providing(&key);
            }
            Command::GetProviders { cid, reply } => {
                let key = kad::RecordKey::new(&cid.as_bytes());
                let query_id = self.swarm.behaviour_mut().kademlia.get_providers(key);
                self.pending_providers.insert(query_id, (Vec::new(), reply));
            }
            Command::SendPullRequest { peer, request, reply } => {
                let request_id = self.swarm.behaviour_mut().pull.send_request(&peer, request);
                self.pending_pull.insert(request_id, reply);
            }
            Command::RespondPull { channel, response } => {
                let _ = self.swarm.behaviour_mut().pull.send_response(channel, response);
            }
        }
    }

    async fn handle_swarm_event(&mut self, event: SwarmEvent<AdirBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(addr = %address, "peer layer listening on");
            }
            SwarmEvent::Behaviour(AdirBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                message,
                ..
            })) => {
                self.handle_gossip_message(&message).await;
            }
            SwarmEvent::Behaviour(AdirBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                for addr in info.listen_addrs {
                    self.swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
                }
            }
            SwarmEvent::Behaviour(AdirBehaviourEvent::Kademlia(kad::Event::OutboundQueryProgressed {
                id,
                result,
                ..
            })) => {
                self.handle_kad_progress(id, result);
            }
            SwarmEvent::Behaviour(AdirBehaviourEvent::Pull(request_response::Event::Message {
                message,
                ..
            })) => match message {
                request_response::Message::Request { request, channel, .. } => {
                    let _ = self.inbound_tx.send(NetworkEvent::PullRequested { request, channel }).await;
                }
                request_response::Message::Response { request_id, response } => {
                    if let Some(reply) = self.pending_pull.remove(&request_id) {
                        let _ = reply.send(Ok(response));
                    }
                }
            },
            SwarmEvent::Behaviour(AdirBehaviourEvent::Pull(request_response::Event::OutboundFailure {
                request_id,
                error,
                ..
            })) => {
                if let Some(reply) = self.pending_pull.remove(&request_id) {
                    let _ = reply.send(Err(PeerError::Remote(error.to_string())));
                }
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!(peer = %peer_id, "connection established");
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!(peer = %peer_id, "connection closed");
            }
            _ => {}
        }
    }

    fn handle_kad_progress(&mut self, id: kad::QueryId, result: kad::QueryResult) {
        match result {
            kad::QueryResult::GetProviders(Ok(kad::GetProvidersOk::FoundProviders { providers, .. })) => {
                if let Some((acc, _)) = self.pending_providers.get_mut(&id) {
                    acc.extend(providers);
                }
            }
            kad::QueryResult::GetProviders(Ok(kad::GetProvidersOk::FinishedWithNoAdditionalRecord {
                ..
            }))
            | kad::QueryResult::GetProviders(Err(_)) => {
                if let Some((providers, reply)) = self.pending_providers.remove(&id) {
                    let _ = reply.send(providers);
                }
            }
            _ => {}
        }
    }

    async fn handle_gossip_message(&mut self, message: &gossipsub::Message) {
        let msg = match GossipMessage::from_bytes(&message.data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "failed to decode gossip message");
                return;
            }
        };
        let source = message.source.map(|p| p.to_string()).unwrap_or_else(|| "unknown".into());
        match &msg {
            GossipMessage::ProviderAnnounce { cid } => {
                // Application relay below also gets this, but the routing
                // table update happens here so it's never missed even if
                // nothing is currently listening on `inbound_tx`.
                self.routing.add_provider(cid, &source).await;
            }
            GossipMessage::ProviderWithdraw { cid } => {
                self.routing.remove_provider(cid, &source).await;
            }
            _ => {}
        }
        let _ = self.inbound_tx.send(NetworkEvent::Gossip(msg)).await;
    }
}
