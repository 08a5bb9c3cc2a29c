//! Error types for the service registry

use crate::models::ServiceName;
use thiserror::Error;

/// Service registry error type
#[derive(Error, Debug)]
pub enum Error {
    /// No registration with this service URL
    #[error("Service at URL {0} not found")]
    ServiceNotFound(String),

    /// Service name unknown to the cache, or known with no providers
    #[error("No providers registered for {0}")]
    NoProviders(ServiceName),

    /// Registration record cannot be served
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    /// Peer answered with a non-success status
    #[error("{url} responded with code {status}")]
    UnexpectedStatus {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
