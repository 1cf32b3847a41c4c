//! Error types for Valet operations

/// Result type for Valet operations
pub type Result<T> = std::result::Result<T, ValetError>;

/// Error types for the Valet core
#[derive(Debug, thiserror::Error)]
pub enum ValetError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tool registry construction or lookup failed
    #[error("Registry error: {0}")]
    Registry(#[from] crate::tools::RegistryError),

    /// Memory collaborator failure
    #[error("Memory error: {0}")]
    Memory(String),

    /// Platform layer failure surfaced outside the tool boundary
    #[error("Platform error: {0}")]
    Platform(#[from] crate::platform::PlatformError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ValetError {
    fn from(s: String) -> Self {
        ValetError::Other(s)
    }
}

impl From<&str> for ValetError {
    fn from(s: &str) -> Self {
        ValetError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ValetError {
    fn from(err: anyhow::Error) -> Self {
        ValetError::Other(err.to_string())
    }
}
