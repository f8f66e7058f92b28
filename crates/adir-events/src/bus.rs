//! The event bus itself: subscribers hold a reader lock to read the
//! subscriber map during `publish`, writers (subscribe/unsubscribe) take
//! an exclusive lock briefly to mutate it. `publish` never blocks on a
//! slow consumer — a full channel is a dropped delivery, counted but
//! never surfaced as an error to the publisher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adir_core::{Event, EventKind};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::filter::Filter;

pub type SubscriptionId = u64;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct Subscriber {
    sender: mpsc::Sender<Event>,
    filter: Filter,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Aggregate counters across every subscriber, snapshotted at a point in
/// time — exposed to the gRPC `EventsService` and to `/readyz`-adjacent
/// introspection.
#[derive(Debug, Clone, Default)]
pub struct BusMetrics {
    pub subscriber_count: usize,
    pub total_published: u64,
    pub total_delivered: u64,
    pub total_dropped: u64,
}

#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<SubscriptionId, Subscriber>>>,
    next_id: Arc<AtomicU64>,
    total_published: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            total_published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a new subscriber with the default channel capacity.
    pub async fn subscribe(&self, filter: Filter) -> (SubscriptionId, mpsc::Receiver<Event>) {
        self.subscribe_with_capacity(filter, DEFAULT_CHANNEL_CAPACITY).await
    }

    pub async fn subscribe_with_capacity(
        &self,
        filter: Filter,
        capacity: usize,
    ) -> (SubscriptionId, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let subscriber = Subscriber { sender, filter, delivered: AtomicU64::new(0), dropped: AtomicU64::new(0) };
        self.subscribers.write().await.insert(id, subscriber);
        debug!(subscription_id = id, "subscribed to event bus");
        (id, receiver)
    }

    /// Idempotent: unsubscribing an id that is already gone is a no-op.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().await.remove(&id);
        debug!(subscription_id = id, "unsubscribed from event bus");
    }

    /// Publish `event` to every matching subscriber. Never returns an
    /// error — an invalid event is logged and dropped at the door, and a
    /// full subscriber channel just increments that subscriber's dropped
    /// counter.
    pub async fn publish(&self, event: Event) {
        if !event.is_valid() {
            warn!(resource_id = %event.resource_id, "refusing to publish invalid event");
            return;
        }
        self.total_published.fetch_add(1, Ordering::Relaxed);

        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.values() {
            if !subscriber.filter.matches(event.kind, &event.resource_id, &event.labels) {
                continue;
            }
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {
                    subscriber.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// The drop count for one subscription, e.g. for a gRPC stream to
    /// report back-pressure against itself (`None` if the subscription has
    /// already been unsubscribed).
    pub async fn subscriber_dropped(&self, id: SubscriptionId) -> Option<u64> {
        self.subscribers.read().await.get(&id).map(|s| s.dropped.load(Ordering::Relaxed))
    }

    pub async fn metrics(&self) -> BusMetrics {
        let subscribers = self.subscribers.read().await;
        let mut delivered = 0;
        let mut dropped = 0;
        for subscriber in subscribers.values() {
            delivered += subscriber.delivered.load(Ordering::Relaxed);
            dropped += subscriber.dropped.load(Ordering::Relaxed);
        }
        BusMetrics {
            subscriber_count: subscribers.len(),
            total_published: self.total_published.load(Ordering::Relaxed),
            total_delivered: delivered,
            total_dropped: dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adir_core::EventKind;

    #[tokio::test]
    async fn subscriber_receives_matching_event() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe(Filter::all()).await;
        bus.publish(Event::new(EventKind::RecordPushed, "bcid1")).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.resource_id, "bcid1");
    }

    #[tokio::test]
    async fn filtered_subscriber_ignores_nonmatching_kind() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe(Filter::all().with_kinds([EventKind::SyncFailed])).await;
        bus.publish(Event::new(EventKind::RecordPushed, "bcid1")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let (id, _rx) = bus.subscribe(Filter::all()).await;
        bus.unsubscribe(id).await;
        bus.unsubscribe(id).await;
    }

    #[tokio::test]
    async fn invalid_event_is_dropped_before_publish() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe(Filter::all()).await;
        bus.publish(Event::new(EventKind::RecordPushed, "")).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.metrics().await.total_published, 0);
    }

    #[tokio::test]
    async fn full_channel_increments_dropped_counter_without_blocking() {
        let bus = EventBus::new();
        let (_id, _rx) = bus.subscribe_with_capacity(Filter::all(), 1).await;
        bus.publish(Event::new(EventKind::RecordPushed, "bcid1")).await;
        bus.publish(Event::new(EventKind::RecordPushed, "bcid2")).await;
        let metrics = bus.metrics().await;
        assert_eq!(metrics.total_dropped, 1);
    }

    #[tokio::test]
    async fn subscriber_dropped_reports_its_own_count_only() {
        let bus = EventBus::new();
        let (slow_id, _slow_rx) = bus.subscribe_with_capacity(Filter::all(), 1).await;
        let (fast_id, _fast_rx) = bus.subscribe_with_capacity(Filter::all(), 8).await;
        bus.publish(Event::new(EventKind::RecordPushed, "bcid1")).await;
        bus.publish(Event::new(EventKind::RecordPushed, "bcid2")).await;
        assert_eq!(bus.subscriber_dropped(slow_id).await, Some(1));
        assert_eq!(bus.subscriber_dropped(fast_id).await, Some(0));
    }

    #[tokio::test]
    async fn subscriber_dropped_is_none_after_unsubscribe() {
        let bus = EventBus::new();
        let (id, _rx) = bus.subscribe(Filter::all()).await;
        bus.unsubscribe(id).await;
        assert_eq!(bus.subscriber_dropped(id).await, None);
    }
}
