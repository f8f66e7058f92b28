/// Configuration for the peer layer's libp2p network.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Local listen address (e.g. "/ip4/0.0.0.0/tcp/9090").
    pub listen_addr: String,
    /// Bootstrap peer multiaddresses. Empty means this node never dials
    /// out and only accepts inbound connections (bootstrap/server role).
    pub bootstrap_peers: Vec<String>,
    /// Protocol version string advertised via identify.
    pub protocol_version: String,
    /// GossipSub topic carrying provider announcements and label queries.
    pub topic: String,
    /// Default hop ceiling applied to a BFS label search that doesn't
    /// specify its own `max_hops`.
    pub default_max_hops: u32,
    /// How long a BFS search waits for responders at each hop before
    /// moving on to the next.
    pub hop_timeout: std::time::Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/9090".into(),
            bootstrap_peers: Vec::new(),
            protocol_version: "/agent-directory/1.0.0".into(),
            topic: "adir-peers".into(),
            default_max_hops: 3,
            hop_timeout: std::time::Duration::from_secs(2),
        }
    }
}
