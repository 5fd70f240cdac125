//! Standardized error handling for Docker Engine responses

use crate::error::{DockerError, Result};
use reqwest::StatusCode;
use serde::Deserialize;

/// Body the engine returns alongside non-2xx statuses
#[derive(Debug, Deserialize)]
struct EngineErrorBody {
    message: String,
}

/// Standard error handler for HTTP responses from the engine
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Extract the engine's `{"message": ...}` text, falling back to the raw body
    pub fn engine_message(error_text: &str) -> String {
        serde_json::from_str::<EngineErrorBody>(error_text)
            .map(|body| body.message)
            .unwrap_or_else(|_| error_text.trim().to_string())
    }

    /// A response arrived but its status means the stream will never start
    pub fn handle_engine_error(status: StatusCode, error_text: &str, operation: &str) -> DockerError {
        let message = Self::engine_message(error_text);
        let error_msg = match status.as_u16() {
            304 => format!("{} had no effect: {}", operation, message),
            400 => format!("Bad parameter for {}: {}", operation, message),
            401 | 403 => format!("Not authorized to perform {}: {}", operation, message),
            404 => format!("No such object for {}: {}", operation, message),
            409 => format!("Conflict during {}: {}", operation, message),
            500 => format!("Daemon error during {}: {}", operation, message),
            502 | 503 => format!("Daemon unavailable for {}: {}", operation, message),
            _ => format!("{} failed (status {}): {}", operation, status, message),
        };

        DockerError::RequestFailure(error_msg)
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn describe(error: &reqwest::Error, context: &str) -> String {
        if error.is_timeout() {
            format!("{} timed out: {}", context, error)
        } else if error.is_connect() {
            format!("Connection error during {}: {}", context, error)
        } else if error.to_string().contains("dns") {
            format!("DNS resolution error for {}: {}", context, error)
        } else {
            format!("{} network error: {}", context, error)
        }
    }
}

/// Validation error utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    pub fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(DockerError::Configuration(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if timeout > 86400 {
            // 24 hours
            return Err(DockerError::Configuration(
                "Timeout cannot exceed 24 hours (86400 seconds)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_directory(path: &str) -> Result<()> {
        let dir = std::path::Path::new(path);

        if !dir.exists() {
            return Err(DockerError::Configuration(format!(
                "Build context does not exist: {}",
                path
            )));
        }

        if !dir.is_dir() {
            return Err(DockerError::Configuration(format!(
                "Build context is not a directory: {}",
                path
            )));
        }

        Ok(())
    }
}
