use std::sync::Arc;

use adir_core::SyncStatus;
use adir_db::SearchDb;
use tonic::{Request, Response, Status as GrpcStatus};

use adir_proto::sync::sync_service_server::SyncService;
use adir_proto::sync::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, StatusRequest, StatusResponse,
    SyncStatus as ProtoSyncStatus,
};

use crate::error::to_status;

pub struct SyncServiceImpl {
    db: Arc<dyn SearchDb>,
}

impl SyncServiceImpl {
    pub fn new(db: Arc<dyn SearchDb>) -> Self {
        Self { db }
    }
}

#[tonic::async_trait]
impl SyncService for SyncServiceImpl {
    async fn create(&self, request: Request<CreateRequest>) -> Result<Response<CreateResponse>, GrpcStatus> {
        let req = request.into_inner();
        let job = self
            .db
            .create_sync_job(&req.remote_url, &req.cid_filter)
            .await
            .map_err(|e| to_status(e.into()))?;
        Ok(Response::new(CreateResponse { sync_id: job.id }))
    }

    async fn status(&self, request: Request<StatusRequest>) -> Result<Response<StatusResponse>, GrpcStatus> {
        let req = request.into_inner();
        let job = self.db.get_sync_job(&req.sync_id).await.map_err(|e| to_status(e.into()))?;
        Ok(Response::new(StatusResponse {
            sync_id: job.id,
            status: proto_status(job.status) as i32,
            last_error: job.last_error,
        }))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteResponse>, GrpcStatus> {
        let req = request.into_inner();
        self.db.delete_sync_job(&req.sync_id).await.map_err(|e| to_status(e.into()))?;
        Ok(Response::new(DeleteResponse {}))
    }
}

fn proto_status(status: SyncStatus) -> ProtoSyncStatus {
    match status {
        SyncStatus::Pending => ProtoSyncStatus::Pending,
        SyncStatus::InProgress => ProtoSyncStatus::InProgress,
        SyncStatus::Completed => ProtoSyncStatus::Completed,
        SyncStatus::Failed => ProtoSyncStatus::Failed,
        SyncStatus::Deleted => ProtoSyncStatus::Deleted,
    }
}
