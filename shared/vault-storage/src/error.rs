//! Error types for secrets backend operations

use thiserror::Error;

/// Result type alias for vault operations
pub type VaultResult<T, E = VaultError> = Result<T, E>;

/// Errors returned by the secrets backend client
#[derive(Debug, Error)]
pub enum VaultError {
    /// Nothing is stored at the requested path
    #[error("Vault path not found: {0}")]
    NotFound(String),

    /// The backend answered with a non-success status
    #[error("Vault request to {path} failed with status {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    /// The request could not be sent or the connection failed
    #[error("Vault request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The response body could not be read
    #[error("Failed to read vault response: {0}")]
    Response(#[from] reqwest::Error),

    /// The response did not have the expected shape
    #[error("Unexpected vault response: {0}")]
    UnexpectedResponse(String),

    /// Login material could not be loaded or login was rejected
    #[error("Vault authentication failed: {0}")]
    Authentication(String),

    /// Payload could not be (de)serialized
    #[error("Failed to (de)serialize vault payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether the error means the path holds nothing
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
