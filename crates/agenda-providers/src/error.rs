//! Error types for calendar source operations.
//!
//! Every adapter reports failures as a [`ProviderError`]. The error code
//! tells callers whether a failure is local to one source (the aggregator
//! isolates those), a credential problem that needs re-authorization, or a
//! failure of the one-shot authorization flow.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// No credential has ever been set on the remote adapter.
    CredentialMissing,
    /// Exchanging the refresh token for a new access token failed.
    RefreshFailed,
    /// The remote service rejected the access token.
    AuthenticationFailed,
    /// The user denied consent during the authorization flow.
    AuthorizationDenied,
    /// The authorization redirect carried neither a code nor an error.
    NoAuthorizationCode,
    /// No authorization redirect arrived before the flow timed out.
    AuthTimeout,
    /// The helper process could not be run, timed out, or exited non-zero.
    SubprocessFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded - too many requests.
    RateLimited,
    /// Server returned an error (5xx status codes or other unexpected status).
    ServerError,
    /// Invalid response - parse error, unexpected format.
    InvalidResponse,
    /// Configuration error - missing or invalid config.
    ConfigurationError,
    /// Internal error - unexpected state, bug.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError | Self::SubprocessFailed
        )
    }

    /// Returns true if the user must run the authorization flow again.
    pub fn needs_reauthorization(&self) -> bool {
        matches!(
            self,
            Self::CredentialMissing | Self::RefreshFailed | Self::AuthenticationFailed
        )
    }

    /// Returns a machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialMissing => "credential_missing",
            Self::RefreshFailed => "refresh_failed",
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationDenied => "authorization_denied",
            Self::NoAuthorizationCode => "no_authorization_code",
            Self::AuthTimeout => "auth_timeout",
            Self::SubprocessFailed => "subprocess_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a calendar source.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The source that generated this error (e.g., "google", "local").
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// Creates a missing-credential error.
    pub fn credential_missing(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CredentialMissing, message)
    }

    /// Creates a refresh failure.
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RefreshFailed, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates an authorization-denied error.
    pub fn authorization_denied(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationDenied, message)
    }

    /// Creates a missing-authorization-code error.
    pub fn no_authorization_code(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NoAuthorizationCode, message)
    }

    /// Creates an authorization timeout error.
    pub fn auth_timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthTimeout, message)
    }

    /// Creates a subprocess error.
    pub fn subprocess(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::SubprocessFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_retryable() {
        assert!(ProviderErrorCode::NetworkError.is_retryable());
        assert!(ProviderErrorCode::SubprocessFailed.is_retryable());
        assert!(!ProviderErrorCode::RefreshFailed.is_retryable());
        assert!(!ProviderErrorCode::AuthorizationDenied.is_retryable());
    }

    #[test]
    fn credential_codes_need_reauthorization() {
        assert!(ProviderErrorCode::CredentialMissing.needs_reauthorization());
        assert!(ProviderErrorCode::RefreshFailed.needs_reauthorization());
        assert!(!ProviderErrorCode::SubprocessFailed.needs_reauthorization());
    }

    #[test]
    fn provider_error_display() {
        let err =
            ProviderError::refresh_failed("token endpoint returned 400").with_provider("google");
        let display = format!("{}", err);
        assert!(display.contains("[google]"));
        assert!(display.contains("refresh_failed"));
        assert!(display.contains("token endpoint returned 400"));
    }

    #[test]
    fn provider_error_accessors() {
        let err = ProviderError::subprocess("exit status 1");
        assert_eq!(err.code(), ProviderErrorCode::SubprocessFailed);
        assert_eq!(err.message(), "exit status 1");
        assert!(err.provider().is_none());
        assert!(err.is_retryable());
    }

    #[test]
    fn provider_error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("broken pipe");
        let err = ProviderError::subprocess("failed to spawn").with_source(io_err);
        assert!(err.source().is_some());
    }
}
