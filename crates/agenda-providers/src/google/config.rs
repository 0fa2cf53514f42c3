//! Google Calendar source configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth 2.0 client credentials for Google API access.
///
/// Users register their own desktop client in the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
}

/// Shape of the credentials JSON downloaded from the Google Cloud Console.
///
/// Accepts an `installed` or `web` section, or a flat object with
/// `client_id`/`client_secret` at the root.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from a Google credentials JSON string.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let Some(section) = file.installed.or(file.web) {
            return Ok(Self::new(section.client_id, section.client_secret));
        }
        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(ProviderError::configuration(
            "credentials JSON needs an 'installed'/'web' section or root 'client_id'/'client_secret'",
        ))
    }

    /// Checks that both fields are present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.trim().is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.trim().is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Configuration for the Google Calendar source.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Label attached to every calendar this source reports.
    pub account_name: String,
    /// OAuth client credentials.
    pub credentials: OAuthCredentials,
    /// Authorization endpoint the browser is sent to.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
    /// Base URL of the Calendar API.
    pub api_base: String,
    /// Loopback port registered as the redirect target.
    pub redirect_port: u16,
    /// Scopes requested during authorization.
    pub scopes: Vec<String>,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// How long the authorization flow waits for the redirect.
    pub auth_timeout: Duration,
    /// Whether the authorization flow launches the system browser.
    pub open_browser: bool,
    /// User agent string for API requests.
    pub user_agent: String,
}

impl GoogleConfig {
    /// Default authorization endpoint.
    pub const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    /// Default token endpoint.
    pub const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    /// Default Calendar API base.
    pub const API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";
    /// Default loopback redirect port.
    pub const DEFAULT_REDIRECT_PORT: u16 = 42813;
    /// Path the loopback listener serves the redirect on.
    pub const REDIRECT_PATH: &'static str = "/oauth/callback";
    /// Default HTTP timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default authorization flow timeout in seconds.
    pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;
    /// Read-only calendar scopes.
    pub const DEFAULT_SCOPES: [&'static str; 2] = [
        "https://www.googleapis.com/auth/calendar.readonly",
        "https://www.googleapis.com/auth/calendar.events.readonly",
    ];

    /// Creates a configuration with Google's endpoints and the given credentials.
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            account_name: "google".to_string(),
            credentials,
            auth_url: Self::AUTH_URL.to_string(),
            token_url: Self::TOKEN_URL.to_string(),
            api_base: Self::API_BASE.to_string(),
            redirect_port: Self::DEFAULT_REDIRECT_PORT,
            scopes: Self::DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            auth_timeout: Duration::from_secs(Self::DEFAULT_AUTH_TIMEOUT_SECS),
            open_browser: true,
            user_agent: format!("agenda/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the account label.
    pub fn with_account_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = name.into();
        self
    }

    /// Sets the authorization endpoint.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Sets the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Sets the Calendar API base URL.
    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Sets the loopback redirect port.
    pub fn with_redirect_port(mut self, port: u16) -> Self {
        self.redirect_port = port;
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the authorization flow timeout.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Enables or disables launching the browser during authorization.
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Returns the redirect URI registered for the loopback listener.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.redirect_port, Self::REDIRECT_PATH)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ProviderResult<()> {
        self.credentials
            .validate()
            .map_err(|e| ProviderError::configuration(format!("invalid credentials: {}", e)))?;

        if self.scopes.is_empty() {
            return Err(ProviderError::configuration(
                "at least one OAuth scope is required",
            ));
        }

        for (field, value) in [
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("api_base", &self.api_base),
        ] {
            url::Url::parse(value).map_err(|e| {
                ProviderError::configuration(format!("invalid {}: {}", field, e))
            })?;
        }

        Ok(())
    }
}
