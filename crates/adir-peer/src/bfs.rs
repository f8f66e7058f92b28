//! Hop-bounded BFS label search: the initiator issues one hop at a time,
//! joining that hop's responders on a single channel before the next hop
//! is issued, rather than racing every depth's replies together.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::timeout;

use crate::message::{GossipMessage, LabelMatch};
use crate::network::PeerHandle;
use crate::routing::ResponseRouter;

pub struct SearchRequest {
    pub labels: Vec<String>,
    pub max_hops: u32,
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
    pub hop_timeout: Duration,
}

/// Broadcast a labeled query and collect matches hop by hop, deduplicating
/// on CID so a record reachable through more than one path is only
/// reported once.
pub async fn network_search(
    handle: &PeerHandle,
    router: &ResponseRouter,
    local_peer: &str,
    request: SearchRequest,
) -> Vec<LabelMatch> {
    let query_id = format!("{local_peer}-{}", next_query_suffix());
    let mut seen: HashMap<String, LabelMatch> = HashMap::new();

    for hop in 1..=request.max_hops {
        let mut responses = router.register(&query_id).await;

        handle
            .publish(GossipMessage::LabelQuery {
                query_id: query_id.clone(),
                labels: request.labels.clone(),
                hop,
                max_hops: request.max_hops,
                allowed: request.allowed.clone(),
                blocked: request.blocked.clone(),
                origin: local_peer.to_string(),
            })
            .await;

        let _ = timeout(request.hop_timeout, async {
            while let Some(m) = responses.recv().await {
                seen.entry(m.cid.clone()).or_insert(m);
            }
        })
        .await;

        router.unregister(&query_id).await;
    }

    seen.into_values().collect()
}

fn next_query_suffix() -> String {
    // A process-wide atomic keeps query ids unique without threading a
    // counter through every caller.
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed).to_string()
}
