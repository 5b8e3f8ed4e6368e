//! Listener, connection loop and graceful shutdown.

use crate::config::ServiceConfig;
use crate::gateway;
use crate::mux::{rpc_body, MultiplexService};
use crate::proto::{
    projects_server::ProjectsServer, roles_server::RolesServer, stacks_server::StacksServer,
    virtual_machines_server::VirtualMachinesServer,
};
use crate::rpc::InventoryService;
use crate::tls;
use anyhow::Context;
use axum::body::Body;
use axum::Router;
use http::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use sreapi_core::{ApiConfig, Inventory, PersistenceGateway, ProtocolConfig};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tonic::body::BoxBody;
use tonic::service::Routes;
use tower::util::MapRequest;
use tracing::{debug, info, warn};

/// The generated RPC services, taking the multiplexer's body type.
pub type RpcRoutes = MapRequest<Routes, fn(Request<Body>) -> Request<BoxBody>>;

/// The complete service mounted on the listener.
pub type InventoryMux = MultiplexService<RpcRoutes, Router>;

/// Handle to a server running in the background.
pub struct RunningServer {
    /// Address actually bound, useful when the configured port was 0.
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RunningServer {
    /// Wait until the server has drained every connection and stopped.
    pub async fn join(self) -> anyhow::Result<()> {
        self.handle.await.context("Server task panicked")
    }
}

/// Mount the four RPC services and the JSON gateway behind one multiplexer.
pub fn build_service<G: PersistenceGateway>(
    inventory: Arc<Inventory<G>>,
    request_timeout: Duration,
) -> InventoryMux {
    let service = InventoryService::new(inventory, request_timeout);

    let routes = Routes::new(ProjectsServer::new(service.clone()))
        .add_service(StacksServer::new(service.clone()))
        .add_service(RolesServer::new(service.clone()))
        .add_service(VirtualMachinesServer::new(service.clone()));
    let rpc: RpcRoutes = MapRequest::new(routes, rpc_body as fn(_) -> _);

    MultiplexService::new(rpc, gateway::router(service))
}

/// Bind the listener and serve until `shutdown` resolves.
///
/// Returns once the listener is bound. After shutdown, open connections are
/// asked to finish in-flight requests before the server task completes.
pub async fn start_server<G, F>(
    config: &ServiceConfig,
    inventory: Arc<Inventory<G>>,
    shutdown: F,
) -> anyhow::Result<RunningServer>
where
    G: PersistenceGateway,
    F: Future<Output = ()> + Send + 'static,
{
    let acceptor = match &config.tls {
        Some(tls_config) => Some(tls::load_acceptor(tls_config)?),
        None => None,
    };

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    let addr = listener.local_addr()?;

    info!(
        "Server listening on {} ({} services + JSON gateway {}, {})",
        addr,
        ApiConfig::RPC_PACKAGE,
        ApiConfig::API_VERSION,
        if acceptor.is_some() { "TLS" } else { "plaintext" }
    );

    let service = build_service(inventory, config.request_timeout());
    let handle = tokio::spawn(serve(listener, acceptor, service, shutdown));

    Ok(RunningServer { addr, handle })
}

/// Accept loop. Each connection runs in its own task.
async fn serve<F>(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    service: InventoryMux,
    shutdown: F,
) where
    F: Future<Output = ()> + Send + 'static,
{
    let (signal_tx, signal_rx) = watch::channel(());
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    if !is_connection_error(&e) {
                        // Out of descriptors and the like: retrying at once would spin
                        warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ProtocolConfig::ACCEPT_ERROR_BACKOFF).await;
                    }
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
        };

        debug!("Accepted connection from {}", peer);
        let service = service.clone();
        let signal = signal_rx.clone();

        match acceptor.clone() {
            Some(acceptor) => {
                tokio::spawn(async move {
                    let mut signal = signal;
                    let handshake = tokio::time::timeout(
                        ProtocolConfig::TLS_HANDSHAKE_TIMEOUT,
                        acceptor.accept(stream),
                    );
                    let tls_stream = tokio::select! {
                        result = handshake => match result {
                            Ok(Ok(tls_stream)) => tls_stream,
                            Ok(Err(e)) => {
                                debug!("TLS handshake with {} failed: {}", peer, e);
                                return;
                            }
                            Err(_) => {
                                debug!("TLS handshake with {} timed out", peer);
                                return;
                            }
                        },
                        _ = signal.changed() => {
                            debug!("Dropping TLS handshake with {} on shutdown", peer);
                            return;
                        }
                    };
                    serve_connection(tls_stream, peer, service, signal).await;
                });
            }
            None => {
                tokio::spawn(serve_connection(stream, peer, service, signal));
            }
        }
    }

    drop(listener);
    drop(signal_rx);
    let _ = signal_tx.send(());
    signal_tx.closed().await;
    info!("Server stopped");
}

/// Errors that only concern the one connection being accepted.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Serve HTTP/1.1 or HTTP/2 on one connection until it closes or the
/// server shuts down.
async fn serve_connection<I>(
    io: I,
    peer: SocketAddr,
    service: InventoryMux,
    mut signal: watch::Receiver<()>,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(io), TowerToHyperService::new(service));
    tokio::pin!(conn);

    let mut shutting_down = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!("Connection from {} ended with error: {}", peer, e);
                }
                break;
            }
            _ = signal.changed(), if !shutting_down => {
                shutting_down = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}
