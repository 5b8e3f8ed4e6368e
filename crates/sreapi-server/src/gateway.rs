//! HTTP/JSON gateway.
//!
//! REST-style routes over the same handlers the RPC services use. Request
//! bodies decode into the RPC request messages and responses are the RPC
//! response messages rendered as JSON.

use crate::rpc::InventoryService;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use sreapi_core::entity::{ProjectRecord, RoleRecord, StackRecord, VirtualMachineRecord};
use sreapi_core::wire::{
    CreateProjectRequest, CreateRoleRequest, CreateStackRequest, CreateVirtualMachineRequest,
    GetProjectResponse, GetReply, GetRoleResponse, GetStackResponse, GetVirtualMachineResponse,
    ItemRequest, KeyRequest, KeyedRequest, ListProjectResponse, ListReply, ListRequest,
    ListRoleResponse, ListStackResponse, ListVirtualMachineResponse, MutationResponse, Reply,
    UpdateProjectRequest, UpdateRoleRequest, UpdateStackRequest, UpdateVirtualMachineRequest,
};
use sreapi_core::{ApiConfig, Entity, Filter, InventoryError, PersistenceGateway};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Build the gateway router.
pub fn router<G: PersistenceGateway>(service: InventoryService<G>) -> Router {
    // Configure CORS for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/v1/projects",
            get(list::<G, ProjectRecord, ListProjectResponse>)
                .post(create::<G, ProjectRecord, CreateProjectRequest>),
        )
        .route(
            "/v1/projects/:name",
            get(fetch::<G, ProjectRecord, GetProjectResponse>)
                .put(update::<G, ProjectRecord, UpdateProjectRequest>)
                .delete(delete::<G, ProjectRecord>),
        )
        .route(
            "/v1/stacks",
            get(list::<G, StackRecord, ListStackResponse>)
                .post(create::<G, StackRecord, CreateStackRequest>),
        )
        .route(
            "/v1/stacks/:name",
            get(fetch::<G, StackRecord, GetStackResponse>)
                .put(update::<G, StackRecord, UpdateStackRequest>)
                .delete(delete::<G, StackRecord>),
        )
        .route(
            "/v1/roles",
            get(list::<G, RoleRecord, ListRoleResponse>)
                .post(create::<G, RoleRecord, CreateRoleRequest>),
        )
        .route(
            "/v1/roles/:name",
            get(fetch::<G, RoleRecord, GetRoleResponse>)
                .put(update::<G, RoleRecord, UpdateRoleRequest>)
                .delete(delete::<G, RoleRecord>),
        )
        .route(
            "/v1/vms",
            get(list::<G, VirtualMachineRecord, ListVirtualMachineResponse>)
                .post(create::<G, VirtualMachineRecord, CreateVirtualMachineRequest>),
        )
        .route(
            "/v1/vms/:hostname",
            get(fetch::<G, VirtualMachineRecord, GetVirtualMachineResponse>)
                .put(update::<G, VirtualMachineRecord, UpdateVirtualMachineRequest>)
                .delete(delete::<G, VirtualMachineRecord>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn reply<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

/// Answer 400 with a failed mutation envelope.
fn bad_request(err: InventoryError) -> Response {
    debug!("Rejected gateway payload: {}", err);
    (
        StatusCode::BAD_REQUEST,
        Json(MutationResponse::failure(ApiConfig::API_VERSION, &err)),
    )
        .into_response()
}

/// Decode a JSON body, or answer 400 with a failed mutation envelope.
fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| bad_request(InventoryError::from(e)))
}

/// Unwrap query parameters, or answer 400 the same way as a bad body.
fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    match extracted {
        Ok(Query(request)) => Ok(request),
        Err(rejection) => Err(bad_request(InventoryError::Protocol {
            message: rejection.body_text(),
        })),
    }
}

/// Put the path segment into the key's identifying field.
fn address<E: Entity>(key: Filter, id: &str) -> Filter {
    match E::KEY.first() {
        Some(field) => key.with(*field, id),
        None => key,
    }
}

async fn list<G, E, R>(
    State(service): State<InventoryService<G>>,
    request: Result<Query<ListRequest>, QueryRejection>,
) -> Response
where
    G: PersistenceGateway,
    E: Entity,
    R: ListReply<E::Wire> + Serialize + Send,
{
    let request = match query(request) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };
    let ctx = service.default_context();
    reply(
        service
            .list_records::<E, R>(ctx, &request.api, request.key())
            .await,
    )
}

async fn fetch<G, E, R>(
    State(service): State<InventoryService<G>>,
    Path(id): Path<String>,
    request: Result<Query<KeyRequest>, QueryRejection>,
) -> Response
where
    G: PersistenceGateway,
    E: Entity,
    R: GetReply<E::Wire> + Serialize + Send,
{
    let request = match query(request) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };
    let ctx = service.default_context();
    let key = address::<E>(request.key(), &id);
    reply(service.get_record::<E, R>(ctx, &request.api, key).await)
}

async fn create<G, E, Q>(State(service): State<InventoryService<G>>, body: Bytes) -> Response
where
    G: PersistenceGateway,
    E: Entity,
    Q: ItemRequest<E::Wire> + DeserializeOwned,
{
    let request: Q = match decode(&body) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };
    let ctx = service.default_context();
    let api = request.api().to_string();
    reply(
        service
            .create_record::<E>(ctx, &api, request.take_item())
            .await,
    )
}

async fn update<G, E, Q>(
    State(service): State<InventoryService<G>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response
where
    G: PersistenceGateway,
    E: Entity,
    Q: ItemRequest<E::Wire> + KeyedRequest + DeserializeOwned,
{
    let request: Q = match decode(&body) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };
    let ctx = service.default_context();
    let api = request.api().to_string();
    let key = address::<E>(request.key(), &id);
    reply(
        service
            .update_record::<E>(ctx, &api, key, request.take_item())
            .await,
    )
}

async fn delete<G, E>(
    State(service): State<InventoryService<G>>,
    Path(id): Path<String>,
    request: Result<Query<KeyRequest>, QueryRejection>,
) -> Response
where
    G: PersistenceGateway,
    E: Entity,
{
    let request = match query(request) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };
    let ctx = service.default_context();
    let key = address::<E>(request.key(), &id);
    reply(service.delete_record::<E>(ctx, &request.api, key).await)
}
