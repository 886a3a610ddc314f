//! Registry error types

use thiserror::Error;

/// Registry-related errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Authentication failed or token rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API error from the registry or index
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Rate limited by the registry
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// The crate version is already present in the registry
    #[error("{name}@{version} already exists in the registry")]
    AlreadyPublished { name: String, version: String },

    /// Cargo refused the manifest or package contents
    #[error("Invalid manifest for {name}: {reason}")]
    InvalidManifest { name: String, reason: String },

    /// Transport-level failure reported by cargo or the HTTP client
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Command execution failed without a recognisable cause
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Network failures, timeouts, rate limits and server-side (5xx) API
    /// errors are transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_) => true,
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            Self::Http(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.is_request()
                    || err.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }

    /// Suggested wait before retrying, when the registry provided one
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
