//! Client error types.

use agenda_providers::ProviderError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored credential could not be read or written.
    #[error("credential store error: {0}")]
    Store(String),

    /// Authentication required.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// Output serialization failed.
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}
