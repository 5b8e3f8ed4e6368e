//! Centralized constants for the inventory service.

use std::time::Duration;

/// API-level configuration.
pub struct ApiConfig;

impl ApiConfig {
    /// Version tag stamped on every response.
    pub const API_VERSION: &'static str = "v1";
    /// Protobuf package the RPC services are registered under.
    pub const RPC_PACKAGE: &'static str = "sreapi.v1";
    pub const DEFAULT_ADDR: &'static str = "127.0.0.1:5555";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    /// Upper bound on any configured request timeout.
    pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
}

/// Protocol detection markers used by the multiplexer.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Content-type prefix that marks a binary RPC call.
    pub const RPC_CONTENT_TYPE_PREFIX: &'static [u8] = b"application/grpc";
    pub const ALPN_H2: &'static [u8] = b"h2";
    pub const ALPN_HTTP11: &'static [u8] = b"http/1.1";
    /// Longest a client may take to finish the TLS handshake.
    pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
    /// Pause after an accept failure that is not about a single connection.
    pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(500);
}

/// Storage configuration.
pub struct StorageConfig;

impl StorageConfig {
    /// Path value that selects a private in-memory database.
    pub const IN_MEMORY: &'static str = ":memory:";
    pub const BUSY_TIMEOUT_MS: u32 = 30_000;
}
