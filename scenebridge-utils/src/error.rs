//! Error types for scenebridge
//!
//! Provides a unified error type for the ambient concerns shared by every
//! crate: files, configuration, logging and socket setup. Bridge-level
//! failures travel as structured `Response::Failure` values instead.

use std::path::PathBuf;

/// Main error type for scenebridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Invalid address '{addr}': {message}")]
    InvalidAddress { addr: String, message: String },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = BridgeError::Io(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = BridgeError::FileRead {
            path: PathBuf::from("/etc/scenebridge.toml"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/etc/scenebridge.toml"));
    }

    #[test]
    fn test_error_display_bind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = BridgeError::Bind {
            addr: "127.0.0.1:9876".into(),
            source: io_err,
        };
        assert_eq!(
            err.to_string(),
            "Failed to bind 127.0.0.1:9876: address in use"
        );
    }

    #[test]
    fn test_error_display_invalid_address() {
        let err = BridgeError::InvalidAddress {
            addr: "nowhere".into(),
            message: "invalid socket address syntax".into(),
        };
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_config_helper() {
        let err = BridgeError::config("port must not be 0");
        assert!(matches!(err, BridgeError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: port must not be 0");
    }

    #[test]
    fn test_config_invalid_display() {
        let err = BridgeError::ConfigInvalid {
            path: PathBuf::from("/home/user/.config/scenebridge/config.toml"),
            message: "expected a table".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("config.toml"));
        assert!(msg.contains("expected a table"));
    }

    #[test]
    fn test_internal_helper() {
        let err = BridgeError::internal("subscriber already set");
        assert_eq!(err.to_string(), "Internal error: subscriber already set");
    }

    #[test]
    fn test_from_io_error_preserves_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: BridgeError = io_err.into();
        if let BridgeError::Io(inner) = err {
            assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
        } else {
            panic!("Expected Io variant");
        }
    }
}
