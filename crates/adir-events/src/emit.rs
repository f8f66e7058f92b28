//! Convenience emitters for every event kind, so callers never build
//! an [`Event`] by hand.

use adir_core::{Cid, Event, EventKind};

use crate::bus::EventBus;

impl EventBus {
    pub async fn emit_record_pushed(&self, cid: &Cid, labels: impl IntoIterator<Item = String>) {
        self.publish(Event::for_cid(EventKind::RecordPushed, cid).with_labels(labels)).await;
    }

    pub async fn emit_record_pulled(&self, cid: &Cid) {
        self.publish(Event::for_cid(EventKind::RecordPulled, cid)).await;
    }

    pub async fn emit_record_deleted(&self, cid: &Cid) {
        self.publish(Event::for_cid(EventKind::RecordDeleted, cid)).await;
    }

    pub async fn emit_record_published(&self, cid: &Cid) {
        self.publish(Event::for_cid(EventKind::RecordPublished, cid)).await;
    }

    pub async fn emit_record_unpublished(&self, cid: &Cid) {
        self.publish(Event::for_cid(EventKind::RecordUnpublished, cid)).await;
    }

    pub async fn emit_record_signed(&self, cid: &Cid) {
        self.publish(Event::for_cid(EventKind::RecordSigned, cid)).await;
    }

    pub async fn emit_record_indexed(&self, cid: &Cid, labels: impl IntoIterator<Item = String>) {
        self.publish(Event::for_cid(EventKind::RecordIndexed, cid).with_labels(labels)).await;
    }

    pub async fn emit_sync_created(&self, job_id: &str) {
        self.publish(Event::new(EventKind::SyncCreated, job_id)).await;
    }

    pub async fn emit_sync_completed(&self, job_id: &str) {
        self.publish(Event::new(EventKind::SyncCompleted, job_id)).await;
    }

    pub async fn emit_sync_failed(&self, job_id: &str) {
        self.publish(Event::new(EventKind::SyncFailed, job_id)).await;
    }
}
