use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cid::Cid;

/// The event kinds the bus must be able to emit: the nine convenience
/// emitters required of the event bus, plus `RecordIndexed`, which marks a
/// CID as having become searchable in the search database — distinct from
/// `RecordPushed`, which marks a record as having been written to the
/// content store. A record can be pushed without yet being indexed (the
/// indexer runs on its own interval), so the two are never collapsed into
/// one kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    RecordPushed,
    RecordPulled,
    RecordDeleted,
    RecordPublished,
    RecordUnpublished,
    RecordSigned,
    RecordIndexed,
    SyncCreated,
    SyncCompleted,
    SyncFailed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// The CID or sync-job id this event concerns. Never empty — an event
    /// with an empty resource id is rejected before publication.
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    /// Hierarchical labels attached to the resource at emission time, used
    /// by label-filtered subscriptions (e.g. `/skills/NLP/Text Completion`).
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl Event {
    pub fn new(kind: EventKind, resource_id: impl Into<String>) -> Self {
        Self { kind, resource_id: resource_id.into(), timestamp: Utc::now(), labels: BTreeSet::new() }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }

    pub fn for_cid(kind: EventKind, cid: &Cid) -> Self {
        Self::new(kind, cid.to_encoded())
    }

    /// The in-process validation every event must pass before publication:
    /// non-empty resource id (the type and timestamp are structurally
    /// guaranteed non-missing by this struct's own fields).
    pub fn is_valid(&self) -> bool {
        !self.resource_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_resource_id_is_invalid() {
        let e = Event::new(EventKind::RecordPushed, "");
        assert!(!e.is_valid());
    }

    #[test]
    fn non_empty_resource_id_is_valid() {
        let e = Event::new(EventKind::RecordPushed, "bsomething");
        assert!(e.is_valid());
    }
}
