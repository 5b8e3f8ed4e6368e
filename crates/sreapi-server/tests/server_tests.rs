//! End-to-end tests: a real listener serving both protocols.

use serde_json::{json, Value};
use sreapi_core::wire::{
    CreateProjectRequest, CreateRoleRequest, CreateStackRequest, CreateVirtualMachineRequest,
    KeyRequest, ListRequest, Project, Role, Stack, VirtualMachine,
};
use sreapi_core::{Inventory, SqliteGateway};
use sreapi_server::proto::projects_client::ProjectsClient;
use sreapi_server::proto::roles_client::RolesClient;
use sreapi_server::proto::stacks_client::StacksClient;
use sreapi_server::proto::virtual_machines_client::VirtualMachinesClient;
use sreapi_server::{start_server, RunningServer, ServiceConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tonic::transport::Channel;

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    server: RunningServer,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let gateway = SqliteGateway::open(dir.path().join("inventory.db")).unwrap();
        let inventory = Arc::new(Inventory::new(gateway));
        let config = ServiceConfig {
            listen: "127.0.0.1:0".to_string(),
            ..ServiceConfig::default()
        };

        let (stop, stopped) = oneshot::channel::<()>();
        let server = start_server(&config, inventory, async move {
            let _ = stopped.await;
        })
        .await
        .unwrap();

        Self {
            addr: server.addr,
            stop,
            server,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn channel(&self) -> Channel {
        Channel::from_shared(self.url(""))
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    async fn stop(self) {
        self.stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.server.join())
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn test_rpc_and_json_share_one_port() {
    let server = TestServer::start().await;
    let mut vms = VirtualMachinesClient::new(server.channel().await);

    let reply = vms
        .create(CreateVirtualMachineRequest {
            api: "v1".into(),
            item: Some(VirtualMachine {
                hostname: "web01".into(),
                project: "core".into(),
                role: "frontend".into(),
                stack: String::new(),
            }),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success, "{}", reply.error);

    // Written over RPC, read over JSON.
    let http = reqwest::Client::new();
    let body: Value = http
        .get(server.url("/v1/vms?project=core"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["api"], "v1");
    assert_eq!(body["items"][0]["hostname"], "web01");
    assert_eq!(body["items"][0]["role"], "frontend");

    // Written over JSON, read over RPC.
    let body: Value = http
        .post(server.url("/v1/vms"))
        .json(&json!({"api": "v1", "item": {"hostname": "db01", "project": "core", "role": "database"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true, "{}", body);

    let reply = vms
        .get(KeyRequest {
            hostname: "db01".into(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success);
    assert_eq!(reply.item.unwrap().role, "database");

    server.stop().await;
}

#[tokio::test]
async fn test_health_over_http() {
    let server = TestServer::start().await;
    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
    server.stop().await;
}

#[tokio::test]
async fn test_hierarchy_over_rpc() {
    let server = TestServer::start().await;
    let channel = server.channel().await;

    let reply = ProjectsClient::new(channel.clone())
        .create(CreateProjectRequest {
            api: "v1".into(),
            item: Some(Project {
                name: "core".into(),
            }),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success, "{}", reply.error);

    let reply = StacksClient::new(channel.clone())
        .create(CreateStackRequest {
            api: "v1".into(),
            item: Some(Stack {
                name: "web".into(),
                project: "core".into(),
            }),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success, "{}", reply.error);

    let mut roles = RolesClient::new(channel.clone());
    let reply = roles
        .create(CreateRoleRequest {
            api: "v1".into(),
            item: Some(Role {
                name: "frontend".into(),
                stack: "web".into(),
                project: "core".into(),
                parent_role: String::new(),
            }),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success, "{}", reply.error);

    // Stack and project are filled in from the role.
    let mut vms = VirtualMachinesClient::new(channel);
    let reply = vms
        .create(CreateVirtualMachineRequest {
            api: "v1".into(),
            item: Some(VirtualMachine {
                hostname: "web01".into(),
                project: "core".into(),
                role: "frontend".into(),
                stack: String::new(),
            }),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success, "{}", reply.error);

    let reply = vms
        .list(ListRequest {
            stack: "web".into(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success);
    assert_eq!(reply.items.len(), 1);
    assert_eq!(reply.items[0].stack, "web");

    let reply = roles
        .get(KeyRequest {
            name: "ghost".into(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!reply.success);
    assert!(reply.error.contains("not found"));

    server.stop().await;
}

#[tokio::test]
async fn test_graceful_shutdown_with_idle_rpc_connection() {
    let server = TestServer::start().await;
    let mut vms = VirtualMachinesClient::new(server.channel().await);
    let reply = vms
        .list(ListRequest::default())
        .await
        .unwrap()
        .into_inner();
    assert!(reply.success);

    // The open HTTP/2 connection must not hold up shutdown.
    server.stop().await;
}
