use adir_core::Reference;
use adir_peer::LocalSearch;
use adir_resolver::{NameResolver, ResolveOptions};
use adir_store::Backend;
use tonic::{Request, Response, Status};

use adir_proto::naming::naming_service_server::NamingService;
use adir_proto::naming::{InfoRequest, InfoResponse};

use crate::error::to_status;

pub struct NamingServiceImpl<B: Backend + 'static, S: LocalSearch + 'static> {
    resolver: NameResolver<B, S>,
}

impl<B: Backend + 'static, S: LocalSearch + 'static> NamingServiceImpl<B, S> {
    pub fn new(resolver: NameResolver<B, S>) -> Self {
        Self { resolver }
    }
}

#[tonic::async_trait]
impl<B: Backend + 'static, S: LocalSearch + 'static> NamingService for NamingServiceImpl<B, S> {
    async fn info(&self, request: Request<InfoRequest>) -> Result<Response<InfoResponse>, Status> {
        let req = request.into_inner();
        let cid = req.cid.as_deref().and_then(adir_core::Cid::parse);
        if req.cid.is_some() && cid.is_none() {
            return Err(Status::invalid_argument("malformed cid"));
        }
        if req.name.is_none() && cid.is_none() {
            return Err(Status::invalid_argument("info request has neither name nor cid"));
        }
        let reference = Reference { name: req.name, version: req.version, cid };

        let opts = ResolveOptions { allow_network: req.allow_network, max_hops: None };
        let resolved = self.resolver.resolve(&reference, &opts).await.map_err(|e| to_status(e.into()))?;

        Ok(Response::new(InfoResponse {
            cid: resolved.cid.to_encoded(),
            verified: resolved.verified,
            ambiguous_alternatives: resolved.ambiguous_alternatives.iter().map(|c| c.to_encoded()).collect(),
        }))
    }
}
