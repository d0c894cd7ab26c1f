//! Error types for coordkv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Node Errors ===
    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Node does not exist: {0}")]
    NodeNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Version conflict on {path}: expected {expected}")]
    VersionConflict { path: String, expected: i64 },

    // === Connection Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Delegated Errors ===
    #[error("Coordination service error: {0}")]
    Service(#[from] etcd_client::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Watch error: {0}")]
    Watch(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    ///
    /// Logical failures (existence conflicts, validation, version mismatch
    /// surfaced as a gRPC status) are never retried; only transient
    /// transport-level failures are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::ConnectionFailed(_) => true,
            Error::Service(e) => matches!(
                e,
                etcd_client::Error::TransportError(_) | etcd_client::Error::IoError(_)
            ),
            _ => false,
        }
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_errors_not_retryable() {
        assert!(!Error::NodeExists("/a".into()).is_retryable());
        assert!(!Error::NodeNotFound("/a".into()).is_retryable());
        assert!(!Error::InvalidPath("no leading slash".into()).is_retryable());
        assert!(!Error::InvalidConfig("empty host".into()).is_retryable());
        assert!(!Error::VersionConflict {
            path: "/a".into(),
            expected: 3
        }
        .is_retryable());
    }

    #[test]
    fn test_transient_errors_retryable() {
        assert!(Error::Timeout("connect".into()).is_retryable());
        assert!(Error::ConnectionFailed("refused".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let e = Error::NodeExists("/registry/a".into());
        assert_eq!(e.to_string(), "Node already exists: /registry/a");

        let e = Error::NodeNotFound("/registry/b".into());
        assert_eq!(e.to_string(), "Node does not exist: /registry/b");
    }

    #[test]
    fn test_from_str() {
        let e: Error = "boom".into();
        assert_eq!(e.to_string(), "boom");
    }
}
