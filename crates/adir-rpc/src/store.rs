use std::pin::Pin;

use adir_core::Record;
use adir_events::EventBus;
use adir_store::{Backend, ContentStore};
use futures::Stream;
use tonic::{Request, Response, Status, Streaming};

use adir_proto::store::store_service_server::StoreService;
use adir_proto::store::{
    push_request, DeleteRequest, DeleteResponse, LookupRequest, LookupResponse, PullRequest,
    PullResponse, PushRequest, PushResponse,
};

use crate::error::to_status;

pub struct StoreServiceImpl<B: Backend + 'static> {
    store: ContentStore<B>,
    bus: EventBus,
}

impl<B: Backend + 'static> StoreServiceImpl<B> {
    pub fn new(store: ContentStore<B>, bus: EventBus) -> Self {
        Self { store, bus }
    }
}

#[tonic::async_trait]
impl<B: Backend + 'static> StoreService for StoreServiceImpl<B> {
    type PullStream = Pin<Box<dyn Stream<Item = Result<PullResponse, Status>> + Send + 'static>>;

    async fn push(&self, request: Request<Streaming<PushRequest>>) -> Result<Response<PushResponse>, Status> {
        let mut stream = request.into_inner();

        let first = stream
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("empty push stream"))?;
        let metadata = match first.part {
            Some(push_request::Part::Metadata(m)) => m,
            _ => return Err(Status::invalid_argument("first push message must carry metadata")),
        };

        let mut bytes = Vec::new();
        while let Some(msg) = stream.message().await? {
            if let Some(push_request::Part::Chunk(chunk)) = msg.part {
                bytes.extend_from_slice(&chunk);
            }
        }

        let record: Record = serde_json::from_slice(&bytes)
            .map_err(|e| Status::invalid_argument(format!("malformed record payload: {e}")))?;

        if record.name != metadata.name || record.version != metadata.version {
            return Err(Status::invalid_argument("metadata does not match record body"));
        }

        let cid = self.store.push(&record).await.map_err(|e| to_status(e.into()))?;

        if let Some(expected) = metadata.digest {
            if expected != cid.to_encoded() {
                return Err(Status::internal(format!(
                    "digest-mismatch: expected {expected}, got {}",
                    cid.to_encoded()
                )));
            }
        }

        // The write path is the hinge onto the event bus: a pushed record
        // is announced with its real skill/domain labels immediately,
        // rather than waiting for the indexer's next poll to relabel it.
        self.bus.emit_record_pushed(&cid, record.event_labels()).await;
        if record.is_signed() {
            self.bus.emit_record_signed(&cid).await;
        }

        Ok(Response::new(PushResponse { cid: cid.to_encoded() }))
    }

    async fn pull(&self, request: Request<PullRequest>) -> Result<Response<Self::PullStream>, Status> {
        let req = request.into_inner();
        let reference = proto_reference(&req)?;
        let pulled = self.store.pull_reference(&reference).await.map_err(|e| to_status(e.into()))?;
        let bytes = serde_json::to_vec(&pulled.record)
            .map_err(|e| Status::internal(format!("failed to encode record: {e}")))?;

        const CHUNK_SIZE: usize = 64 * 1024;
        let chunks: Vec<Result<PullResponse, Status>> =
            bytes.chunks(CHUNK_SIZE).map(|c| Ok(PullResponse { chunk: c.to_vec() })).collect();

        Ok(Response::new(Box::pin(futures::stream::iter(chunks))))
    }

    async fn lookup(&self, request: Request<LookupRequest>) -> Result<Response<LookupResponse>, Status> {
        let req = request.into_inner();
        let cid = adir_core::Cid::parse(&req.cid).ok_or_else(|| Status::invalid_argument("malformed cid"))?;
        let pulled = self.store.pull(&cid).await.map_err(|e| to_status(e.into()))?;
        Ok(Response::new(LookupResponse {
            cid: req.cid,
            name: pulled.record.name,
            version: pulled.record.version,
            schema_version: pulled.record.schema_version,
            authors: pulled.record.authors,
            description: pulled.record.description,
            annotations: pulled.record.annotations,
        }))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteResponse>, Status> {
        let req = request.into_inner();
        let reference = adir_core::Reference::by_name(&req.name, Some(req.version.clone()));
        let cid = self.store.resolve(&reference).await.map_err(|e| to_status(e.into()))?;
        self.store.delete(&req.name, &req.version).await.map_err(|e| to_status(e.into()))?;
        self.bus.emit_record_deleted(&cid).await;
        Ok(Response::new(DeleteResponse {}))
    }
}

fn proto_reference(req: &PullRequest) -> Result<adir_core::Reference, Status> {
    let cid = req.cid.as_deref().and_then(adir_core::Cid::parse);
    if req.cid.is_some() && cid.is_none() {
        return Err(Status::invalid_argument("malformed cid in pull request"));
    }
    if req.name.is_none() && cid.is_none() {
        return Err(Status::invalid_argument("pull request has neither name nor cid"));
    }
    Ok(adir_core::Reference { name: req.name.clone(), version: req.version.clone(), cid })
}
