//! Server configuration file.
//!
//! Everything has a default, so the file is optional and may set any subset
//! of keys. Relative paths in the file are resolved against the file's own
//! directory.

use serde::Deserialize;
use sreapi_core::{ApiConfig, InventoryError, Result, StorageConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the shared listener binds to.
    pub listen: String,
    pub database: DatabaseConfig,
    /// Deadline for requests that do not carry their own.
    pub request_timeout_secs: u64,
    /// Plain TCP when absent.
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, or `":memory:"`.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// CA used to verify client certificates.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default)]
    pub require_client_auth: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: ApiConfig::DEFAULT_ADDR.to_string(),
            database: DatabaseConfig::default(),
            request_timeout_secs: ApiConfig::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            tls: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sreapi.db"),
        }
    }
}

impl ServiceConfig {
    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| InventoryError::io_with_path(e, path))?;
        let mut config = Self::from_toml(&text).map_err(|e| InventoryError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        config.rebase_paths(path);
        Ok(config)
    }

    /// Parse configuration text. Paths are left as written.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Default request deadline, capped at [`ApiConfig::MAX_REQUEST_TIMEOUT`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs).min(ApiConfig::MAX_REQUEST_TIMEOUT)
    }

    fn rebase_paths(&mut self, path: &Path) {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if self.database.path.as_os_str() != StorageConfig::IN_MEMORY {
            self.database.path = join_base(base, &self.database.path);
        }
        if let Some(tls) = &mut self.tls {
            tls.cert = join_base(base, &tls.cert);
            tls.key = join_base(base, &tls.key);
            if let Some(ca) = &mut tls.ca_cert {
                *ca = join_base(base, ca);
            }
        }
    }
}

fn join_base(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ServiceConfig::from_toml("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.listen, "127.0.0.1:5555");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sreapi.toml");
        fs::write(
            &path,
            r#"
listen = "0.0.0.0:8443"
request_timeout_secs = 3

[database]
path = "data/inventory.db"

[tls]
cert = "certs/server.pem"
key = "/etc/sreapi/server.key"
ca_cert = "certs/ca.pem"
require_client_auth = true
"#,
        )
        .unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8443");
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.database.path, dir.path().join("data/inventory.db"));

        let tls = config.tls.unwrap();
        assert_eq!(tls.cert, dir.path().join("certs/server.pem"));
        assert_eq!(tls.key, PathBuf::from("/etc/sreapi/server.key"));
        assert_eq!(tls.ca_cert, Some(dir.path().join("certs/ca.pem")));
        assert!(tls.require_client_auth);
    }

    #[test]
    fn test_huge_timeout_is_capped() {
        let config = ServiceConfig {
            request_timeout_secs: u64::MAX,
            ..ServiceConfig::default()
        };
        assert_eq!(config.request_timeout(), ApiConfig::MAX_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_in_memory_database_not_rebased() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sreapi.toml");
        fs::write(&path, "[database]\npath = \":memory:\"\n").unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from(":memory:"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sreapi.toml");
        fs::write(&path, "listen = [").unwrap();

        let err = ServiceConfig::load(&path).unwrap_err();
        assert!(matches!(err, InventoryError::Config { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ServiceConfig::load(Path::new("/nonexistent/sreapi.toml")).unwrap_err();
        assert!(matches!(err, InventoryError::Io { .. }));
    }
}
