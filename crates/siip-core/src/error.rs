//! Error types for SI-IP
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for SI-IP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for SI-IP
#[derive(Error, Debug)]
pub enum Error {
    /// Every resolution server is cooling down, even after the back-off wait
    #[error("No available IP resolution servers")]
    NoServersAvailable,

    /// A resolution round finished without a single usable answer
    #[error("Failed to fetch IP from any server")]
    ResolutionFailed,

    /// Startup dependency check failed
    #[error("Dependency check failed: {0}")]
    DependencyCheck(String),

    /// Initial record creation failed
    #[error("Record initialization failed: {0}")]
    RecordInit(String),

    /// One or more required configuration fields are missing or empty
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// I/O errors (config file reads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error should abort the process at startup
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::DependencyCheck(_) | Self::RecordInit(_) | Self::MissingConfig(_) | Self::Config(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
