//! The publish/announce hinge the data-flow overview describes: a record
//! that becomes visible in the search database is published and
//! announced to the peer network without any caller having to ask for it
//! twice, and the reverse on deletion — this is the only place
//! `db::publish`/`unpublish` and `peer::announce`/`withdraw` are ever
//! called from the node binary.

use std::sync::Arc;

use adir_core::{Cid, EventKind};
use adir_db::SearchDb;
use adir_events::{EventBus, Filter};
use adir_peer::{LocalSearch, PeerLayer};
use adir_store::Backend;
use tracing::warn;

/// Subscribes to the bus and runs until the bus (and thus this
/// subscription's channel) is dropped. Spawned once at node startup.
pub async fn run<B: Backend + 'static, S: LocalSearch + 'static>(
    bus: EventBus,
    db: Arc<dyn SearchDb>,
    peer: Arc<PeerLayer<B, S>>,
) {
    let filter = Filter::all().with_kinds([EventKind::RecordPushed, EventKind::RecordDeleted]);
    let (_id, mut events) = bus.subscribe(filter).await;

    while let Some(event) = events.recv().await {
        let Some(cid) = Cid::parse(&event.resource_id) else {
            warn!(resource_id = %event.resource_id, "announcer received an event with an unparseable cid");
            continue;
        };

        match event.kind {
            EventKind::RecordPushed => {
                if !db.is_published(&event.resource_id).await.unwrap_or(false) {
                    if let Err(e) = db.publish(&event.resource_id).await {
                        warn!(cid = %cid, error = %e, "failed to record publication, skipping announce");
                        continue;
                    }
                    bus.emit_record_published(&cid).await;
                    peer.announce(&cid).await;
                }
            }
            EventKind::RecordDeleted => {
                if let Err(e) = db.unpublish(&event.resource_id).await {
                    warn!(cid = %cid, error = %e, "failed to clear publication on delete");
                }
                bus.emit_record_unpublished(&cid).await;
                peer.withdraw(&cid).await;
            }
            _ => {}
        }
    }
}
