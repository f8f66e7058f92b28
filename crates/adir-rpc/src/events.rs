use std::pin::Pin;

use adir_core::EventKind;
use adir_events::{EventBus, Filter};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::debug;

use adir_proto::events::events_service_server::EventsService;
use adir_proto::events::{EventMessage, ListenRequest};

pub struct EventsServiceImpl {
    bus: EventBus,
}

impl EventsServiceImpl {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[tonic::async_trait]
impl EventsService for EventsServiceImpl {
    type ListenStream = Pin<Box<dyn Stream<Item = Result<EventMessage, Status>> + Send + 'static>>;

    async fn listen(&self, request: Request<ListenRequest>) -> Result<Response<Self::ListenStream>, Status> {
        let req = request.into_inner();

        let mut filter = Filter::all();
        if !req.kinds.is_empty() {
            let kinds: Vec<EventKind> = req.kinds.iter().filter_map(|k| parse_kind(k)).collect();
            filter = filter.with_kinds(kinds);
        }
        if !req.labels.is_empty() {
            filter = filter.with_labels(req.labels);
        }
        if !req.resource_ids.is_empty() {
            filter = filter.with_resource_ids(req.resource_ids);
        }

        let (subscription_id, receiver) = self.bus.subscribe(filter).await;
        debug!(subscription_id, "gRPC events stream opened");

        let bus = self.bus.clone();
        let stream = ReceiverStream::new(receiver).then(move |event| {
            let bus = bus.clone();
            async move {
                let dropped_total = bus.subscriber_dropped(subscription_id).await.unwrap_or(0);
                Ok(EventMessage {
                    kind: kind_name(event.kind).to_string(),
                    resource_id: event.resource_id,
                    labels: event.labels.into_iter().collect(),
                    occurred_at_unix_ms: event.timestamp.timestamp_millis(),
                    dropped_total,
                })
            }
        });

        Ok(Response::new(Box::pin(stream)))
    }
}

fn kind_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::RecordPushed => "record_pushed",
        EventKind::RecordPulled => "record_pulled",
        EventKind::RecordDeleted => "record_deleted",
        EventKind::RecordPublished => "record_published",
        EventKind::RecordUnpublished => "record_unpublished",
        EventKind::RecordSigned => "record_signed",
        EventKind::RecordIndexed => "record_indexed",
        EventKind::SyncCreated => "sync_created",
        EventKind::SyncCompleted => "sync_completed",
        EventKind::SyncFailed => "sync_failed",
    }
}

fn parse_kind(s: &str) -> Option<EventKind> {
    Some(match s {
        "record_pushed" => EventKind::RecordPushed,
        "record_pulled" => EventKind::RecordPulled,
        "record_deleted" => EventKind::RecordDeleted,
        "record_published" => EventKind::RecordPublished,
        "record_unpublished" => EventKind::RecordUnpublished,
        "record_signed" => EventKind::RecordSigned,
        "record_indexed" => EventKind::RecordIndexed,
        "sync_created" => EventKind::SyncCreated,
        "sync_completed" => EventKind::SyncCompleted,
        "sync_failed" => EventKind::SyncFailed,
        _ => return None,
    })
}
