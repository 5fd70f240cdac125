//! Error types and handlers for Docker Engine stream operations

pub mod handlers;

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DockerError>;

#[derive(Error, Debug)]
pub enum DockerError {
    /// Malformed frame header, truncated frame or unknown channel id
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// The transport never produced a response
    #[error("Request failure: {0}")]
    RequestFailure(String),
    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout { operation: String, after: Duration },
    /// Event stream ended without a recognized completion status
    #[error("Incomplete stream: {0}")]
    IncompleteStream(String),
    /// The daemon reported an error inside the event stream
    #[error("Remote error: {0}")]
    Remote(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Worker error: {0}")]
    Worker(String),
}

impl DockerError {
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        DockerError::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Timeouts are local; everything else came from the wire or the daemon.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DockerError::Timeout { .. })
    }
}

impl From<url::ParseError> for DockerError {
    fn from(err: url::ParseError) -> Self {
        DockerError::Configuration(format!("Invalid URL: {}", err))
    }
}

impl From<tokio::task::JoinError> for DockerError {
    fn from(err: tokio::task::JoinError) -> Self {
        DockerError::Worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguishable() {
        let err = DockerError::timeout("stream readiness", Duration::from_secs(10));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("stream readiness"));

        assert!(!DockerError::Remote("no such image".to_string()).is_timeout());
        assert!(!DockerError::RequestFailure("refused".to_string()).is_timeout());
    }

    #[test]
    fn test_url_error_maps_to_configuration() {
        let err: DockerError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, DockerError::Configuration(_)));
    }
}
