//! RPC service implementations.
//!
//! [`InventoryService`] implements the four generated service traits. Every
//! method funnels into one of five generic handlers (`list_records`,
//! `get_record`, ...), which the JSON gateway calls as well, so both
//! surfaces share one code path per operation.

use crate::proto::{
    projects_server::Projects, roles_server::Roles, stacks_server::Stacks,
    virtual_machines_server::VirtualMachines,
};
use sreapi_core::entity::{ProjectRecord, RoleRecord, StackRecord, VirtualMachineRecord};
use sreapi_core::wire::{
    CreateProjectRequest, CreateRoleRequest, CreateStackRequest, CreateVirtualMachineRequest,
    GetProjectResponse, GetReply, GetRoleResponse, GetStackResponse, GetVirtualMachineResponse,
    ItemRequest, KeyRequest, KeyedRequest, ListProjectResponse, ListReply, ListRequest,
    ListRoleResponse, ListStackResponse, ListVirtualMachineResponse, MutationResponse, Reply,
    UpdateProjectRequest, UpdateRoleRequest, UpdateStackRequest, UpdateVirtualMachineRequest,
};
use sreapi_core::{
    ApiConfig, Entity, Filter, Inventory, InventoryError, PersistenceGateway, RequestContext,
    Result,
};
use std::sync::Arc;
use std::time::Duration;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{debug, error, warn};

/// Header carrying the caller's deadline on RPC requests.
const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Handler state shared by the RPC services and the gateway.
pub struct InventoryService<G> {
    inventory: Arc<Inventory<G>>,
    request_timeout: Duration,
}

impl<G> Clone for InventoryService<G> {
    fn clone(&self) -> Self {
        Self {
            inventory: Arc::clone(&self.inventory),
            request_timeout: self.request_timeout,
        }
    }
}

impl<G: PersistenceGateway> InventoryService<G> {
    pub fn new(inventory: Arc<Inventory<G>>, request_timeout: Duration) -> Self {
        Self {
            inventory,
            request_timeout,
        }
    }

    /// Context for a request without a deadline of its own.
    pub fn default_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }

    /// Context honouring the caller's `grpc-timeout`, if it sent one.
    pub fn rpc_context(&self, metadata: &MetadataMap) -> RequestContext {
        let timeout = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout)
            .unwrap_or(self.request_timeout);
        RequestContext::with_timeout(timeout)
    }

    pub async fn list_records<E, R>(&self, ctx: RequestContext, api: &str, filter: Filter) -> R
    where
        E: Entity,
        R: ListReply<E::Wire> + Send,
    {
        check_api::<E>("list", api);
        let result = self
            .run(ctx, move |inventory, ctx| inventory.list::<E>(ctx, &filter))
            .await;
        match result {
            Ok(items) => {
                let mut reply = R::with_items(items);
                reply.stamp(ApiConfig::API_VERSION, true, String::new());
                reply
            }
            Err(e) => failure::<E, R>("list", &e),
        }
    }

    pub async fn get_record<E, R>(&self, ctx: RequestContext, api: &str, key: Filter) -> R
    where
        E: Entity,
        R: GetReply<E::Wire> + Send,
    {
        check_api::<E>("get", api);
        let result = self
            .run(ctx, move |inventory, ctx| inventory.get::<E>(ctx, &key))
            .await;
        match result {
            Ok(item) => {
                let mut reply = R::with_item(item);
                reply.stamp(ApiConfig::API_VERSION, true, String::new());
                reply
            }
            Err(e) => failure::<E, R>("get", &e),
        }
    }

    pub async fn create_record<E: Entity>(
        &self,
        ctx: RequestContext,
        api: &str,
        item: Option<E::Wire>,
    ) -> MutationResponse {
        check_api::<E>("create", api);
        let result = match item {
            Some(wire) => {
                self.run(ctx, move |inventory, ctx| {
                    inventory.create::<E>(ctx, &wire).map(|_| ())
                })
                .await
            }
            None => Err(missing_item::<E>()),
        };
        mutation::<E>("create", result)
    }

    pub async fn update_record<E: Entity>(
        &self,
        ctx: RequestContext,
        api: &str,
        key: Filter,
        item: Option<E::Wire>,
    ) -> MutationResponse {
        check_api::<E>("update", api);
        let result = match item {
            Some(wire) => {
                self.run(ctx, move |inventory, ctx| {
                    inventory.update::<E>(ctx, &key, &wire).map(|_| ())
                })
                .await
            }
            None => Err(missing_item::<E>()),
        };
        mutation::<E>("update", result)
    }

    pub async fn delete_record<E: Entity>(
        &self,
        ctx: RequestContext,
        api: &str,
        key: Filter,
    ) -> MutationResponse {
        check_api::<E>("delete", api);
        let result = self
            .run(ctx, move |inventory, ctx| {
                inventory.delete::<E>(ctx, &key).map(|_| ())
            })
            .await;
        mutation::<E>("delete", result)
    }

    /// Run synchronous inventory work on the blocking pool under the
    /// request's deadline. On expiry the request is cancelled, so the
    /// blocking side stops at its next check.
    async fn run<T, F>(&self, ctx: RequestContext, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inventory<G>, &RequestContext) -> Result<T> + Send + 'static,
    {
        let inventory = Arc::clone(&self.inventory);
        let task_ctx = ctx.clone();
        let task = tokio::task::spawn_blocking(move || {
            task_ctx.check()?;
            work(&inventory, &task_ctx)
        });

        match tokio::time::timeout(ctx.remaining(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(InventoryError::Other(format!(
                "Inventory task failed: {}",
                join_error
            ))),
            Err(_) => {
                ctx.cancel();
                Err(InventoryError::DeadlineExceeded)
            }
        }
    }
}

/// Parse a `grpc-timeout` value: up to eight digits and a unit.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount * 60 * 60)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

/// Requests for another API version are still served.
fn check_api<E: Entity>(op: &str, api: &str) {
    if !api.is_empty() && api != ApiConfig::API_VERSION {
        warn!(
            "{} {} request for API {}, serving {}",
            op,
            E::KIND,
            api,
            ApiConfig::API_VERSION
        );
    }
}

fn missing_item<E: Entity>() -> InventoryError {
    InventoryError::validation("item", format!("request carries no {}", E::KIND))
}

fn log_failure<E: Entity>(op: &str, err: &InventoryError) {
    match err {
        InventoryError::Cancelled | InventoryError::DeadlineExceeded => {
            warn!("{} {} abandoned: {}", op, E::KIND, err)
        }
        e if e.is_client_error() => debug!("{} {} rejected: {}", op, E::KIND, e),
        e => error!("{} {} failed: {}", op, E::KIND, e),
    }
}

fn failure<E: Entity, R: Reply>(op: &str, err: &InventoryError) -> R {
    log_failure::<E>(op, err);
    R::failure(ApiConfig::API_VERSION, err)
}

fn mutation<E: Entity>(op: &str, result: Result<()>) -> MutationResponse {
    match result {
        Ok(()) => MutationResponse::ok(ApiConfig::API_VERSION),
        Err(e) => failure::<E, MutationResponse>(op, &e),
    }
}

/// Implements one generated service trait on top of the generic handlers.
macro_rules! rpc_service {
    ($service:ident, $record:ty, $list:ty, $get:ty, $create:ty, $update:ty) => {
        #[tonic::async_trait]
        impl<G: PersistenceGateway> $service for InventoryService<G> {
            async fn list(
                &self,
                request: Request<ListRequest>,
            ) -> std::result::Result<Response<$list>, Status> {
                let ctx = self.rpc_context(request.metadata());
                let request = request.into_inner();
                let reply = self
                    .list_records::<$record, $list>(ctx, &request.api, request.key())
                    .await;
                Ok(Response::new(reply))
            }

            async fn get(
                &self,
                request: Request<KeyRequest>,
            ) -> std::result::Result<Response<$get>, Status> {
                let ctx = self.rpc_context(request.metadata());
                let request = request.into_inner();
                let reply = self
                    .get_record::<$record, $get>(ctx, &request.api, request.key())
                    .await;
                Ok(Response::new(reply))
            }

            async fn create(
                &self,
                request: Request<$create>,
            ) -> std::result::Result<Response<MutationResponse>, Status> {
                let ctx = self.rpc_context(request.metadata());
                let request = request.into_inner();
                let api = request.api.clone();
                let reply = self
                    .create_record::<$record>(ctx, &api, request.take_item())
                    .await;
                Ok(Response::new(reply))
            }

            async fn update(
                &self,
                request: Request<$update>,
            ) -> std::result::Result<Response<MutationResponse>, Status> {
                let ctx = self.rpc_context(request.metadata());
                let request = request.into_inner();
                let api = request.api.clone();
                let key = request.key();
                let reply = self
                    .update_record::<$record>(ctx, &api, key, request.take_item())
                    .await;
                Ok(Response::new(reply))
            }

            async fn delete(
                &self,
                request: Request<KeyRequest>,
            ) -> std::result::Result<Response<MutationResponse>, Status> {
                let ctx = self.rpc_context(request.metadata());
                let request = request.into_inner();
                let reply = self
                    .delete_record::<$record>(ctx, &request.api, request.key())
                    .await;
                Ok(Response::new(reply))
            }
        }
    };
}

rpc_service!(
    Projects,
    ProjectRecord,
    ListProjectResponse,
    GetProjectResponse,
    CreateProjectRequest,
    UpdateProjectRequest
);
rpc_service!(
    Stacks,
    StackRecord,
    ListStackResponse,
    GetStackResponse,
    CreateStackRequest,
    UpdateStackRequest
);
rpc_service!(
    Roles,
    RoleRecord,
    ListRoleResponse,
    GetRoleResponse,
    CreateRoleRequest,
    UpdateRoleRequest
);
rpc_service!(
    VirtualMachines,
    VirtualMachineRecord,
    ListVirtualMachineResponse,
    GetVirtualMachineResponse,
    CreateVirtualMachineRequest,
    UpdateVirtualMachineRequest
);
