//! sreapi Server - gRPC and HTTP/JSON front end for the inventory.
//!
//! Both protocols share one listener. [`mux::MultiplexService`] routes each
//! request by its framing to either the generated RPC services or the axum
//! gateway, and both end up in the same [`rpc::InventoryService`] handlers.

pub mod config;
pub mod gateway;
pub mod mux;
pub mod rpc;
pub mod server;
pub mod tls;

/// Generated RPC service stubs (`sreapi.v1`).
#[allow(clippy::all)]
pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/sreapi.v1.Projects.rs"));
    include!(concat!(env!("OUT_DIR"), "/sreapi.v1.Stacks.rs"));
    include!(concat!(env!("OUT_DIR"), "/sreapi.v1.Roles.rs"));
    include!(concat!(env!("OUT_DIR"), "/sreapi.v1.VirtualMachines.rs"));
}

pub use config::{DatabaseConfig, ServiceConfig, TlsConfig};
pub use mux::MultiplexService;
pub use rpc::InventoryService;
pub use server::{build_service, start_server, RunningServer};
