//! adir-peer
//!
//! The DHT-backed peer layer: Kademlia provider announcement, gossipsub
//! flooding for labeled BFS search, and a request-response protocol for
//! pull-sync. Built on the same behaviour-composition pattern as the
//! upstream node's p2p crate, generalized from "broadcast new vertices"
//! to "announce and discover content-addressed records."

pub mod bfs;
pub mod config;
pub mod error;
pub mod layer;
pub mod message;
pub mod network;
pub mod routing;

pub use config::PeerConfig;
pub use error::{PeerError, PeerResult};
pub use layer::{ListRequest, ListResult, LocalSearch, PeerLayer};
pub use message::{GossipMessage, LabelMatch, PullRequest, PullResponse};
pub use network::{NetworkEvent, PeerHandle, PeerNetwork};
