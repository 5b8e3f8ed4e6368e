//! Generates the RPC service stubs.
//!
//! The message types are hand-written `prost` structs in `sreapi_core::wire`,
//! so services are declared here with tonic-build's manual builder instead of
//! being compiled from a `.proto` file.

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "sreapi.v1";
const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("sreapi_core::wire::{}", input))
        .output_type(format!("sreapi_core::wire::{}", output))
        .codec_path(CODEC)
        .build()
}

/// One service per kind, each with the same five methods.
fn inventory_service(service: &str, kind: &str) -> Service {
    Service::builder()
        .name(service)
        .package(PACKAGE)
        .comment(format!("List, Get, Create, Update and Delete for {} records.", kind))
        .method(method(
            "list",
            "List",
            "ListRequest",
            &format!("List{}Response", kind),
        ))
        .method(method(
            "get",
            "Get",
            "KeyRequest",
            &format!("Get{}Response", kind),
        ))
        .method(method(
            "create",
            "Create",
            &format!("Create{}Request", kind),
            "MutationResponse",
        ))
        .method(method(
            "update",
            "Update",
            &format!("Update{}Request", kind),
            "MutationResponse",
        ))
        .method(method("delete", "Delete", "KeyRequest", "MutationResponse"))
        .build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    Builder::new().compile(&[
        inventory_service("Projects", "Project"),
        inventory_service("Stacks", "Stack"),
        inventory_service("Roles", "Role"),
        inventory_service("VirtualMachines", "VirtualMachine"),
    ]);
}
