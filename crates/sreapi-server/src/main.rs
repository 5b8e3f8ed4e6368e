//! sreapi Server - inventory service for projects, stacks, roles and VMs.
//!
//! Serves gRPC and HTTP/JSON on a single listener, backed by SQLite.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use sreapi_core::{Inventory, SqliteGateway};
use sreapi_server::{start_server, ServiceConfig, TlsConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "sreapi-server")]
#[command(about = "Inventory service speaking gRPC and HTTP/JSON on one port")]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// SQLite database file, or ":memory:"
    #[arg(long)]
    database: Option<PathBuf>,

    /// Deadline for requests that do not carry one
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// PEM certificate chain; enables TLS together with --tls-key
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// CA used to verify client certificates
    #[arg(long, requires = "tls_cert")]
    tls_ca_cert: Option<PathBuf>,

    /// Reject clients without a certificate signed by --tls-ca-cert
    #[arg(long, requires = "tls_ca_cert")]
    require_client_auth: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Args {
    /// Load the configuration file, if any, and apply flag overrides.
    fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if let Some(timeout) = self.timeout_secs {
            config.request_timeout_secs = timeout;
        }
        if let (Some(cert), Some(key)) = (&self.tls_cert, &self.tls_key) {
            config.tls = Some(TlsConfig {
                cert: cert.clone(),
                key: key.clone(),
                ca_cert: self.tls_ca_cert.clone(),
                require_client_auth: self.require_client_auth,
            });
        }
        Ok(config)
    }
}

fn init_logging(args: &Args) {
    let log_level = if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    match args.log_format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting sreapi server");

    let config = args.service_config()?;
    info!("Database: {}", config.database.path.display());

    let gateway = SqliteGateway::open(&config.database.path)?;
    let inventory = Arc::new(Inventory::new(gateway));

    let server = start_server(&config, inventory, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, draining connections");
    })
    .await?;

    info!("sreapi server running on {}", server.addr);
    server.join().await
}
