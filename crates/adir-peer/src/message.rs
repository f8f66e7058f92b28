//! Wire messages exchanged over gossipsub (flooded, best-effort) and over
//! the request-response protocol (direct, one reply per request).

use adir_store::{Descriptor, Manifest};
use serde::{Deserialize, Serialize};

/// Messages broadcast over the gossipsub topic: provider announcements
/// and labeled BFS search traffic. Bincode-encoded, the same wire shape
/// the upstream p2p layer uses for its own gossip messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    /// A peer is now (or is no longer) willing to serve a CID.
    ProviderAnnounce { cid: String },
    ProviderWithdraw { cid: String },

    /// A labeled BFS query, flooded with a hop counter that callers
    /// decrement as it's relayed so it eventually stops propagating.
    LabelQuery {
        query_id: String,
        labels: Vec<String>,
        hop: u32,
        max_hops: u32,
        allowed: Vec<String>,
        blocked: Vec<String>,
        origin: String,
    },

    /// A responder's matches for a given query, addressed back by id —
    /// flooded rather than unicast, since the originator's peer id may
    /// not be directly reachable through NAT.
    LabelResponse { query_id: String, peer: String, matches: Vec<LabelMatch> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelMatch {
    pub cid: String,
    pub name: String,
    pub version: String,
    pub peer: String,
    pub labels: Vec<String>,
}

impl GossipMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("GossipMessage serialization is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Direct request-response pull of a manifest plus its blobs, sent to one
/// chosen provider rather than flooded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub cid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PullResponse {
    Found {
        name: String,
        version: String,
        manifest: Manifest,
        config_bytes: Vec<u8>,
        layers: Vec<(Descriptor, Vec<u8>)>,
    },
    NotFound,
}
