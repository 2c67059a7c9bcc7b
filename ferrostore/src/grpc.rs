// Copyright 2024 FerroStore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::control::{
    self, EventArgs, GenericArgs, HealListArgs, HealObjectArgs, SetBucketListenerArgs, SetBucketNotificationArgs,
    SetBucketPolicyArgs,
};
use crate::error::ApiError;
use crate::notification::PolicyChange;
use crate::server::ServerContext;
use crate::version::get_version;
use ferrostore_credentials::INTER_NODE_TOKEN_EXPIRY;
use ferrostore_protos::proto_gen::node_service::{
    node_service_server::{NodeService as Node, NodeServiceServer as NodeServer},
    GenerallyRequest, GenerallyResponse, HealObjectsResponse, LockInfoResponse, LoginRequest, LoginResponse,
    RemoteLockInfoResponse,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

/// The control-plane RPC service of one node.
#[derive(Clone)]
pub struct NodeService {
    ctx: Arc<ServerContext>,
}

/// Builds the tonic server for the node's control-plane service.
pub fn make_server(ctx: Arc<ServerContext>) -> NodeServer<NodeService> {
    NodeServer::new(NodeService { ctx })
}

impl NodeService {
    /// Pulls the generic preamble out of the payload and validates the
    /// token. Rejected tokens surface as `unauthenticated` before any
    /// side effect takes place.
    fn parse_generic(&self, args: &str) -> Result<GenericArgs, Status> {
        let generic: GenericArgs =
            serde_json::from_str(args).map_err(|err| Status::invalid_argument(format!("malformed args: {err}")))?;
        if !self.ctx.is_rpc_token_valid(&generic.token) {
            return Err(Status::unauthenticated(ApiError::InvalidToken.to_string()));
        }
        Ok(generic)
    }

    /// Parses the full, method-specific args shape. The token has
    /// already been checked via [`NodeService::parse_generic`].
    fn parse_args<T: DeserializeOwned>(&self, args: &str) -> Result<T, Status> {
        serde_json::from_str(args).map_err(|err| Status::invalid_argument(format!("malformed args: {err}")))
    }
}

fn generally_ok() -> GenerallyResponse {
    GenerallyResponse {
        success: true,
        error_info: None,
    }
}

fn generally_err(err: ApiError) -> GenerallyResponse {
    warn!("control RPC failed: {err}");
    GenerallyResponse {
        success: false,
        error_info: Some(err.to_string()),
    }
}

#[tonic::async_trait]
impl Node for NodeService {
    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        debug!("login attempt from {}", req.username);

        let svc = self
            .ctx
            .token_service(INTER_NODE_TOKEN_EXPIRY)
            .map_err(|err| ApiError::from(err).to_status())?;
        svc.authenticate(&req.username, &req.password)
            .map_err(|err| ApiError::from(err).to_status())?;
        let token = svc.generate(&req.username).map_err(|err| ApiError::from(err).to_status())?;

        Ok(Response::new(LoginResponse {
            token,
            server_version: get_version().to_owned(),
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        }))
    }

    async fn lock_info(&self, request: Request<GenerallyRequest>) -> Result<Response<LockInfoResponse>, Status> {
        let req = request.into_inner();
        let args = self.parse_generic(&req.args)?;

        match control::lock_info(&self.ctx, &args).await {
            Ok(rep) => Ok(Response::new(LockInfoResponse {
                success: true,
                error_info: None,
                lock_info: serde_json::to_string(&rep).map_err(|err| Status::internal(err.to_string()))?,
            })),
            Err(err) => {
                warn!("cluster lock info failed: {err}");
                Ok(Response::new(LockInfoResponse {
                    success: false,
                    error_info: Some(err.to_string()),
                    lock_info: String::new(),
                }))
            }
        }
    }

    async fn remote_lock_info(&self, request: Request<GenerallyRequest>) -> Result<Response<RemoteLockInfoResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;

        let state = self.ctx.ns_lock().system_lock_state();
        Ok(Response::new(RemoteLockInfoResponse {
            success: true,
            error_info: None,
            lock_state: serde_json::to_string(&state).map_err(|err| Status::internal(err.to_string()))?,
        }))
    }

    async fn heal_format(&self, request: Request<GenerallyRequest>) -> Result<Response<GenerallyResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;

        Ok(Response::new(match control::heal_format(&self.ctx).await {
            Ok(()) => generally_ok(),
            Err(err) => generally_err(err),
        }))
    }

    async fn heal_objects(&self, request: Request<GenerallyRequest>) -> Result<Response<HealObjectsResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;
        let args: HealObjectArgs = self.parse_args(&req.args)?;

        match control::heal_objects(&self.ctx, &args).await {
            Ok(results) => Ok(Response::new(HealObjectsResponse {
                success: true,
                error_info: None,
                results: serde_json::to_string(&results).map_err(|err| Status::internal(err.to_string()))?,
            })),
            Err(err) => {
                warn!("heal objects failed: {err}");
                Ok(Response::new(HealObjectsResponse {
                    success: false,
                    error_info: Some(err.to_string()),
                    results: String::new(),
                }))
            }
        }
    }

    async fn list_objects_heal(&self, request: Request<GenerallyRequest>) -> Result<Response<GenerallyResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;
        let args: HealListArgs = self.parse_args(&req.args)?;

        Ok(Response::new(match control::list_objects_heal(&self.ctx, &args).await {
            Ok(_listing) => generally_ok(),
            Err(err) => generally_err(err),
        }))
    }

    async fn set_bucket_notification(&self, request: Request<GenerallyRequest>) -> Result<Response<GenerallyResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;
        let args: SetBucketNotificationArgs = self.parse_args(&req.args)?;

        if self.ctx.object_layer().is_none() {
            return Ok(Response::new(generally_err(ApiError::ServerNotInitialized)));
        }
        self.ctx
            .event_notifier()
            .set_bucket_notification_config(&args.bucket, args.ncfg)
            .await;
        Ok(Response::new(generally_ok()))
    }

    async fn set_bucket_listener(&self, request: Request<GenerallyRequest>) -> Result<Response<GenerallyResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;
        let args: SetBucketListenerArgs = self.parse_args(&req.args)?;

        if self.ctx.object_layer().is_none() {
            return Ok(Response::new(generally_err(ApiError::ServerNotInitialized)));
        }
        Ok(Response::new(
            match self.ctx.event_notifier().set_bucket_listener_config(&args.bucket, args.lcfg).await {
                Ok(()) => generally_ok(),
                Err(err) => generally_err(err),
            },
        ))
    }

    async fn set_bucket_policy(&self, request: Request<GenerallyRequest>) -> Result<Response<GenerallyResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;
        let args: SetBucketPolicyArgs = self.parse_args(&req.args)?;

        if self.ctx.object_layer().is_none() {
            return Ok(Response::new(generally_err(ApiError::ServerNotInitialized)));
        }
        let change: PolicyChange = match serde_json::from_slice(&args.pch_bytes) {
            Ok(change) => change,
            Err(err) => return Ok(Response::new(generally_err(ApiError::Serde(err)))),
        };
        Ok(Response::new(
            match self.ctx.bucket_policies().set_bucket_policy(&args.bucket, change).await {
                Ok(()) => generally_ok(),
                Err(err) => generally_err(err),
            },
        ))
    }

    async fn event(&self, request: Request<GenerallyRequest>) -> Result<Response<GenerallyResponse>, Status> {
        let req = request.into_inner();
        self.parse_generic(&req.args)?;
        let args: EventArgs = self.parse_args(&req.args)?;

        if self.ctx.object_layer().is_none() {
            return Ok(Response::new(generally_err(ApiError::ServerNotInitialized)));
        }
        Ok(Response::new(
            match self.ctx.event_notifier().send_listener_event(&args.arn, args.events).await {
                Ok(()) => generally_ok(),
                Err(err) => generally_err(err),
            },
        ))
    }
}
