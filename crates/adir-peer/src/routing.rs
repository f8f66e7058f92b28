//! Local bookkeeping: known CID providers, and the table that routes
//! inbound `LabelResponse` gossip back to whichever in-flight BFS search
//! is waiting on that query id.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};

use crate::message::LabelMatch;

#[derive(Default, Clone)]
pub struct RoutingTable {
    inner: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_provider(&self, cid: &str, peer: &str) {
        let mut guard = self.inner.write().await;
        guard.entry(cid.to_string()).or_default().insert(peer.to_string());
    }

    pub async fn remove_provider(&self, cid: &str, peer: &str) {
        let mut guard = self.inner.write().await;
        if let Some(peers) = guard.get_mut(cid) {
            peers.remove(peer);
            if peers.is_empty() {
                guard.remove(cid);
            }
        }
    }

    /// Known providers for `cid`, lowest peer-id first — the tie-break
    /// order callers pick a provider from when round-trip data is absent.
    pub async fn providers(&self, cid: &str) -> Vec<String> {
        self.inner.read().await.get(cid).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }
}

/// Demultiplexes `LabelResponse` gossip by query id, so the single shared
/// swarm-event reader can hand each in-flight BFS search only the
/// responses that belong to it.
#[derive(Default, Clone)]
pub struct ResponseRouter {
    inner: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<LabelMatch>>>>,
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, query_id: &str) -> mpsc::UnboundedReceiver<LabelMatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().await.insert(query_id.to_string(), tx);
        rx
    }

    pub async fn unregister(&self, query_id: &str) {
        self.inner.lock().await.remove(query_id);
    }

    pub async fn route(&self, query_id: &str, m: LabelMatch) {
        let guard = self.inner.lock().await;
        if let Some(tx) = guard.get(query_id) {
            let _ = tx.send(m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(cid: &str) -> LabelMatch {
        LabelMatch {
            cid: cid.into(),
            name: "example/agent".into(),
            version: "1.0.0".into(),
            peer: "peer-a".into(),
            labels: vec!["/skills/NLP/Text Completion".into()],
        }
    }

    #[tokio::test]
    async fn routing_table_tracks_and_drops_empty_entries() {
        let table = RoutingTable::new();
        table.add_provider("bcid1", "peer-a").await;
        table.add_provider("bcid1", "peer-b").await;
        assert_eq!(table.providers("bcid1").await, vec!["peer-a", "peer-b"]);

        table.remove_provider("bcid1", "peer-a").await;
        assert_eq!(table.providers("bcid1").await, vec!["peer-b"]);

        table.remove_provider("bcid1", "peer-b").await;
        assert!(table.providers("bcid1").await.is_empty());
    }

    #[tokio::test]
    async fn response_router_delivers_only_to_registered_query() {
        let router = ResponseRouter::new();
        let mut rx = router.register("query-1").await;

        router.route("query-2", sample_match("bcid1")).await;
        assert!(rx.try_recv().is_err());

        router.route("query-1", sample_match("bcid2")).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.cid, "bcid2");
    }

    #[tokio::test]
    async fn unregistering_stops_further_delivery() {
        let router = ResponseRouter::new();
        let _rx = router.register("query-1").await;
        router.unregister("query-1").await;
        // Routing after unregister is a silent no-op, not a panic.
        router.route("query-1", sample_match("bcid1")).await;
    }
}
