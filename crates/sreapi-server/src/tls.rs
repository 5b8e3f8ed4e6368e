//! TLS acceptor for the shared listener.

use crate::config::TlsConfig;
use sreapi_core::{InventoryError, ProtocolConfig, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// Build an acceptor from PEM material on disk.
///
/// ALPN offers `h2` first so RPC clients negotiate HTTP/2, with
/// `http/1.1` for plain JSON clients. With a `ca_cert`, client certificates
/// issued by that CA are verified; `require_client_auth` makes them
/// mandatory.
pub fn load_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor> {
    let certs = load_certs(&tls.cert)?;
    let key = load_key(&tls.key)?;
    let provider = Arc::new(ring::default_provider());

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?;

    let builder = match &tls.ca_cert {
        Some(ca_path) => {
            let roots = Arc::new(load_roots(ca_path)?);
            let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider);
            let verifier = if tls.require_client_auth {
                verifier.build()
            } else {
                verifier.allow_unauthenticated().build()
            }
            .map_err(|e| InventoryError::Tls {
                message: format!("Invalid client CA {}: {}", ca_path.display(), e),
            })?;
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let mut config = builder.with_single_cert(certs, key).map_err(tls_error)?;
    config.alpn_protocols = vec![
        ProtocolConfig::ALPN_H2.to_vec(),
        ProtocolConfig::ALPN_HTTP11.to_vec(),
    ];

    info!(
        "TLS enabled with certificate {} (client auth: {})",
        tls.cert.display(),
        if tls.ca_cert.is_none() {
            "off"
        } else if tls.require_client_auth {
            "required"
        } else {
            "optional"
        }
    );
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn tls_error(err: tokio_rustls::rustls::Error) -> InventoryError {
    InventoryError::Tls {
        message: err.to_string(),
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| InventoryError::io_with_path(e, path))?;
    Ok(BufReader::new(file))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| InventoryError::io_with_path(e, path))?;
    if certs.is_empty() {
        return Err(InventoryError::Tls {
            message: format!("No certificates found in {}", path.display()),
        });
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| InventoryError::io_with_path(e, path))?
        .ok_or_else(|| InventoryError::Tls {
            message: format!("No private key found in {}", path.display()),
        })
}

fn load_roots(path: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert).map_err(tls_error)?;
    }
    Ok(roots)
}
