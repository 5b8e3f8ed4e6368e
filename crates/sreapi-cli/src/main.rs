//! sreapi - command-line client for the inventory service.
//!
//! Talks gRPC to a running `sreapi-server`. Records are printed one per
//! line; a response with `success=false` ends the process with a non-zero
//! exit status and the server's error text.

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use output::{print_all, Line};
use sreapi_core::wire::{
    CreateProjectRequest, CreateRoleRequest, CreateStackRequest, CreateVirtualMachineRequest,
    KeyRequest, ListRequest, Project, Role, Stack, UpdateVirtualMachineRequest, VirtualMachine,
};
use sreapi_core::ApiConfig;
use sreapi_server::proto::{
    projects_client::ProjectsClient, roles_client::RolesClient, stacks_client::StacksClient,
    virtual_machines_client::VirtualMachinesClient,
};
use std::path::PathBuf;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sreapi")]
#[command(about = "Manage projects, stacks, roles and virtual machines")]
struct Cli {
    /// Server address (host:port)
    #[arg(long, default_value = ApiConfig::DEFAULT_ADDR)]
    addr: String,

    /// CA certificate; connects over TLS when given
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Name to verify the server certificate against
    #[arg(long, requires = "ca_cert")]
    domain: Option<String>,

    /// Per-call deadline
    #[arg(long, default_value_t = 1)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    kind: Kind,
}

#[derive(Subcommand, Debug)]
enum Kind {
    /// Virtual machines
    Vm {
        #[command(subcommand)]
        op: VmOp,
    },
    /// Projects
    Project {
        #[command(subcommand)]
        op: ProjectOp,
    },
    /// Stacks
    Stack {
        #[command(subcommand)]
        op: StackOp,
    },
    /// Roles
    Role {
        #[command(subcommand)]
        op: RoleOp,
    },
}

#[derive(Subcommand, Debug)]
enum VmOp {
    Create {
        hostname: String,
        project: String,
        role: String,
        #[arg(long, default_value_t)]
        stack: String,
    },
    List {
        #[arg(long, default_value_t)]
        project: String,
        #[arg(long, default_value_t)]
        stack: String,
        #[arg(long, default_value_t)]
        role: String,
    },
    Get {
        hostname: String,
    },
    /// Replace the VM currently named OLD_HOSTNAME
    Update {
        old_hostname: String,
        hostname: String,
        project: String,
        role: String,
        #[arg(long, default_value_t)]
        stack: String,
    },
    Delete {
        hostname: String,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectOp {
    Create {
        name: String,
    },
    List {
        #[arg(long, default_value_t)]
        name: String,
    },
    Get {
        name: String,
    },
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum StackOp {
    Create {
        name: String,
        #[arg(long)]
        project: String,
    },
    List {
        #[arg(long, default_value_t)]
        name: String,
        #[arg(long, default_value_t)]
        project: String,
    },
    Get {
        name: String,
        #[arg(long, default_value_t)]
        project: String,
    },
    Delete {
        name: String,
        #[arg(long, default_value_t)]
        project: String,
    },
}

#[derive(Subcommand, Debug)]
enum RoleOp {
    Create {
        name: String,
        #[arg(long)]
        project: String,
        #[arg(long)]
        stack: String,
        /// Role this one specialises
        #[arg(long, default_value_t)]
        parent: String,
    },
    List {
        #[arg(long, default_value_t)]
        name: String,
        #[arg(long, default_value_t)]
        project: String,
        #[arg(long, default_value_t)]
        stack: String,
    },
    Get {
        name: String,
        #[arg(long, default_value_t)]
        project: String,
        #[arg(long, default_value_t)]
        stack: String,
    },
    Delete {
        name: String,
        #[arg(long, default_value_t)]
        project: String,
        #[arg(long, default_value_t)]
        stack: String,
    },
}

/// Connection plus per-call settings.
struct Session {
    channel: Channel,
    timeout: Duration,
}

impl Session {
    async fn connect(cli: &Cli) -> Result<Self> {
        let timeout = Duration::from_secs(cli.timeout_secs);
        let scheme = if cli.ca_cert.is_some() { "https" } else { "http" };
        let mut endpoint = Endpoint::from_shared(format!("{}://{}", scheme, cli.addr))
            .with_context(|| format!("Invalid server address {}", cli.addr))?
            .connect_timeout(timeout);

        if let Some(ca_path) = &cli.ca_cert {
            let pem = tokio::fs::read(ca_path)
                .await
                .with_context(|| format!("Failed to read {}", ca_path.display()))?;
            let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
            if let Some(domain) = &cli.domain {
                tls = tls.domain_name(domain.clone());
            }
            endpoint = endpoint.tls_config(tls)?;
        }

        debug!("Connecting to {}", endpoint.uri());
        let channel = endpoint
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", cli.addr))?;
        Ok(Self { channel, timeout })
    }

    /// Wrap a message, sending the deadline as `grpc-timeout`.
    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);
        request
    }
}

fn api() -> String {
    ApiConfig::API_VERSION.to_string()
}

fn check(success: bool, error: &str) -> Result<()> {
    if success {
        Ok(())
    } else {
        bail!("{}", error)
    }
}

async fn run_vm(session: &Session, op: VmOp) -> Result<()> {
    let mut client = VirtualMachinesClient::new(session.channel.clone());
    match op {
        VmOp::Create {
            hostname,
            project,
            role,
            stack,
        } => {
            let request = CreateVirtualMachineRequest {
                api: api(),
                item: Some(VirtualMachine {
                    hostname,
                    project,
                    role,
                    stack,
                }),
            };
            let reply = client.create(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
        VmOp::List {
            project,
            stack,
            role,
        } => {
            let request = ListRequest {
                api: api(),
                project,
                stack,
                role,
                ..Default::default()
            };
            let reply = client.list(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            print_all(&reply.items);
            Ok(())
        }
        VmOp::Get { hostname } => {
            let request = KeyRequest {
                api: api(),
                hostname,
                ..Default::default()
            };
            let reply = client.get(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            if let Some(vm) = reply.item {
                println!("{}", vm.line());
            }
            Ok(())
        }
        VmOp::Update {
            old_hostname,
            hostname,
            project,
            role,
            stack,
        } => {
            let request = UpdateVirtualMachineRequest {
                api: api(),
                hostname: old_hostname,
                item: Some(VirtualMachine {
                    hostname,
                    project,
                    role,
                    stack,
                }),
                ..Default::default()
            };
            let reply = client.update(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
        VmOp::Delete { hostname } => {
            let request = KeyRequest {
                api: api(),
                hostname,
                ..Default::default()
            };
            let reply = client.delete(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
    }
}

async fn run_project(session: &Session, op: ProjectOp) -> Result<()> {
    let mut client = ProjectsClient::new(session.channel.clone());
    match op {
        ProjectOp::Create { name } => {
            let request = CreateProjectRequest {
                api: api(),
                item: Some(Project { name }),
            };
            let reply = client.create(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
        ProjectOp::List { name } => {
            let request = ListRequest {
                api: api(),
                name,
                ..Default::default()
            };
            let reply = client.list(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            print_all(&reply.items);
            Ok(())
        }
        ProjectOp::Get { name } => {
            let request = KeyRequest {
                api: api(),
                name,
                ..Default::default()
            };
            let reply = client.get(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            if let Some(project) = reply.item {
                println!("{}", project.line());
            }
            Ok(())
        }
        ProjectOp::Delete { name } => {
            let request = KeyRequest {
                api: api(),
                name,
                ..Default::default()
            };
            let reply = client.delete(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
    }
}

async fn run_stack(session: &Session, op: StackOp) -> Result<()> {
    let mut client = StacksClient::new(session.channel.clone());
    match op {
        StackOp::Create { name, project } => {
            let request = CreateStackRequest {
                api: api(),
                item: Some(Stack { name, project }),
            };
            let reply = client.create(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
        StackOp::List { name, project } => {
            let request = ListRequest {
                api: api(),
                name,
                project,
                ..Default::default()
            };
            let reply = client.list(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            print_all(&reply.items);
            Ok(())
        }
        StackOp::Get { name, project } => {
            let request = KeyRequest {
                api: api(),
                name,
                project,
                ..Default::default()
            };
            let reply = client.get(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            if let Some(stack) = reply.item {
                println!("{}", stack.line());
            }
            Ok(())
        }
        StackOp::Delete { name, project } => {
            let request = KeyRequest {
                api: api(),
                name,
                project,
                ..Default::default()
            };
            let reply = client.delete(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
    }
}

async fn run_role(session: &Session, op: RoleOp) -> Result<()> {
    let mut client = RolesClient::new(session.channel.clone());
    match op {
        RoleOp::Create {
            name,
            project,
            stack,
            parent,
        } => {
            let request = CreateRoleRequest {
                api: api(),
                item: Some(Role {
                    name,
                    stack,
                    project,
                    parent_role: parent,
                }),
            };
            let reply = client.create(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
        RoleOp::List {
            name,
            project,
            stack,
        } => {
            let request = ListRequest {
                api: api(),
                name,
                project,
                stack,
                ..Default::default()
            };
            let reply = client.list(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            print_all(&reply.items);
            Ok(())
        }
        RoleOp::Get {
            name,
            project,
            stack,
        } => {
            let request = KeyRequest {
                api: api(),
                name,
                project,
                stack,
                ..Default::default()
            };
            let reply = client.get(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)?;
            if let Some(role) = reply.item {
                println!("{}", role.line());
            }
            Ok(())
        }
        RoleOp::Delete {
            name,
            project,
            stack,
        } => {
            let request = KeyRequest {
                api: api(),
                name,
                project,
                stack,
                ..Default::default()
            };
            let reply = client.delete(session.request(request)).await?.into_inner();
            check(reply.success, &reply.error)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays one record per line
    let log_level = if cli.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let session = Session::connect(&cli).await?;
    match cli.kind {
        Kind::Vm { op } => run_vm(&session, op).await,
        Kind::Project { op } => run_project(&session, op).await,
        Kind::Stack { op } => run_stack(&session, op).await,
        Kind::Role { op } => run_role(&session, op).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_vm_create_arguments() {
        let cli = Cli::try_parse_from([
            "sreapi", "vm", "create", "web01", "core", "frontend", "--stack", "web",
        ])
        .unwrap();
        assert_eq!(cli.addr, "127.0.0.1:5555");
        assert_eq!(cli.timeout_secs, 1);
        match cli.kind {
            Kind::Vm {
                op:
                    VmOp::Create {
                        hostname,
                        project,
                        role,
                        stack,
                    },
            } => {
                assert_eq!(hostname, "web01");
                assert_eq!(project, "core");
                assert_eq!(role, "frontend");
                assert_eq!(stack, "web");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_list_filters_default_to_empty() {
        let cli = Cli::try_parse_from(["sreapi", "vm", "list", "--role", "frontend"]).unwrap();
        match cli.kind {
            Kind::Vm {
                op:
                    VmOp::List {
                        project,
                        stack,
                        role,
                    },
            } => {
                assert!(project.is_empty());
                assert!(stack.is_empty());
                assert_eq!(role, "frontend");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_role_list_by_name() {
        let cli = Cli::try_parse_from(["sreapi", "role", "list", "--name", "frontend"]).unwrap();
        match cli.kind {
            Kind::Role {
                op:
                    RoleOp::List {
                        name,
                        project,
                        stack,
                    },
            } => {
                assert_eq!(name, "frontend");
                assert!(project.is_empty());
                assert!(stack.is_empty());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_stack_create_requires_project() {
        assert!(Cli::try_parse_from(["sreapi", "stack", "create", "web"]).is_err());
        assert!(Cli::try_parse_from(["sreapi", "stack", "create", "web", "--project", "core"]).is_ok());
    }

    #[test]
    fn test_domain_requires_ca_cert() {
        assert!(Cli::try_parse_from(["sreapi", "--domain", "sreapi.local", "project", "list"]).is_err());
    }

    #[test]
    fn test_check_reports_server_error() {
        assert!(check(true, "").is_ok());
        let err = check(false, "project not found: ghost").unwrap_err();
        assert_eq!(err.to_string(), "project not found: ghost");
    }
}
