//! Error types for the inventory service.
//!
//! Every failure a handler can produce maps onto one variant here. The
//! protocol layers never see raw storage errors: they render
//! [`InventoryError::public_message`] into the `error` field of a response
//! whose `success` flag is false.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    // Caller errors, detected before any I/O
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Malformed payload: {message}")]
    Protocol { message: String },

    // Lookup outcomes
    #[error("{kind} not found: {key}")]
    NotFound { kind: String, key: String },

    #[error("{kind} already exists: {key}")]
    Conflict { kind: String, key: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Request lifetime
    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    // Bootstrap errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("TLS error: {message}")]
    Tls { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

impl From<rusqlite::Error> for InventoryError {
    fn from(err: rusqlite::Error) -> Self {
        InventoryError::Storage {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        InventoryError::Protocol {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for InventoryError {
    fn from(err: std::io::Error) -> Self {
        InventoryError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl InventoryError {
    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        InventoryError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        InventoryError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Validation { .. } => "validation",
            InventoryError::Protocol { .. } => "protocol",
            InventoryError::NotFound { .. } => "not_found",
            InventoryError::Conflict { .. } => "conflict",
            InventoryError::Storage { .. } => "storage",
            InventoryError::Cancelled => "cancelled",
            InventoryError::DeadlineExceeded => "deadline_exceeded",
            _ => "internal",
        }
    }

    /// Message safe to hand back to a caller.
    ///
    /// Storage and bootstrap failures collapse to a generic text so query
    /// text and file paths never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            InventoryError::Storage { .. } => "storage failure".to_string(),
            InventoryError::Config { .. }
            | InventoryError::Tls { .. }
            | InventoryError::Io { .. }
            | InventoryError::Other(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the failure was caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InventoryError::Validation { .. }
                | InventoryError::Protocol { .. }
                | InventoryError::NotFound { .. }
                | InventoryError::Conflict { .. }
        )
    }
}
