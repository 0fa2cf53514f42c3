//! OAuth 2.0 authorization code flow for Google APIs.
//!
//! [`OAuthClient`] talks to the token endpoint for both grant types.
//! [`AuthorizationFlow`] runs the one-shot interactive setup:
//!
//! 1. Bind a loopback listener on the configured redirect port
//! 2. Open the browser on the consent page (`access_type=offline`,
//!    `prompt=consent`, so a refresh token is always issued)
//! 3. Wait for a single redirect carrying `code` or `error`
//! 4. Exchange the code for an [`OAuthCredential`]
//!
//! The listener is owned by the waiting future. Success, failure and
//! timeout all drop that future, which closes the port.

use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::config::{GoogleConfig, OAuthCredentials};
use super::tokens::OAuthCredential;

/// Header lines read from a redirect request before giving up on it.
const MAX_HEADER_LINES: usize = 64;

/// Time a connection gets to deliver its request line and headers.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>agenda</title></head><body>\
<h1>Authorization successful</h1>\
<p>You can close this tab and return to the terminal.</p>\
<script>setTimeout(() => window.close(), 2000);</script>\
</body></html>";

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The new access token.
    pub access_token: String,
    /// A refresh token, if the endpoint issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    /// Token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error payload returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the OAuth token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    token_url: String,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a token endpoint client from the source configuration.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            credentials: config.credentials.clone(),
            token_url: config.token_url.clone(),
            http_client,
        })
    }

    /// Exchanges an authorization code for an initial token pair.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> ProviderResult<TokenResponse> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        let response = self.request_token(&params).await?;
        info!("exchanged authorization code for tokens");
        Ok(response)
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> ProviderResult<TokenResponse> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.request_token(&params).await
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("token request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read token response: {}", e))
        })?;

        // Error payloads are reported whatever the status code.
        if let Ok(payload) = serde_json::from_str::<TokenErrorResponse>(&body) {
            let detail = payload
                .error_description
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            return Err(ProviderError::authentication(format!(
                "token endpoint returned {}: {}{}",
                status, payload.error, detail
            )));
        }

        if !status.is_success() {
            return Err(ProviderError::server(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })
    }
}

/// What a single redirect request resolved to.
enum Redirect {
    Code(String),
    Denied(String),
    Empty,
}

/// The interactive setup flow that obtains the first credential.
#[derive(Debug)]
pub struct AuthorizationFlow {
    config: GoogleConfig,
    client: OAuthClient,
}

impl AuthorizationFlow {
    /// Creates a flow for the given configuration.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;
        let client = OAuthClient::new(&config)?;
        Ok(Self { config, client })
    }

    /// Builds the consent page URL the browser is sent to.
    pub fn authorization_url(&self) -> ProviderResult<String> {
        let scope = self.config.scopes.join(" ");
        let redirect_uri = self.config.redirect_uri();
        let url = url::Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ProviderError::configuration(format!("invalid auth_url: {}", e)))?;
        Ok(url.into())
    }

    /// Runs the flow to completion.
    ///
    /// # Errors
    ///
    /// - `AuthorizationDenied` if the redirect carries `error`
    /// - `NoAuthorizationCode` if it carries neither `code` nor `error`
    /// - `AuthTimeout` if no redirect arrives within the configured timeout
    /// - token endpoint errors from the code exchange
    pub async fn run(&self) -> ProviderResult<OAuthCredential> {
        let port = self.config.redirect_port;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
            ProviderError::configuration(format!(
                "cannot listen on 127.0.0.1:{} for the OAuth redirect: {}",
                port, e
            ))
            .with_source(e)
        })?;
        debug!(port, "bound loopback redirect listener");

        let auth_url = self.authorization_url()?;
        if self.config.open_browser {
            info!("opening browser for Google authorization");
            if let Err(e) = open::that(&auth_url) {
                warn!(
                    error = %e,
                    url = %auth_url,
                    "failed to open browser, visit the URL manually"
                );
            }
        } else {
            info!(url = %auth_url, "waiting for authorization");
        }

        match tokio::time::timeout(self.config.auth_timeout, self.wait_for_redirect(listener))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.config.auth_timeout, "authorization timed out");
                Err(ProviderError::auth_timeout(format!(
                    "no authorization redirect within {}s",
                    self.config.auth_timeout.as_secs()
                )))
            }
        }
    }

    /// Serves connections concurrently so an idle one (a browser preconnect)
    /// cannot hold up the redirect.
    async fn wait_for_redirect(&self, listener: TcpListener) -> ProviderResult<OAuthCredential> {
        let mut connections = FuturesUnordered::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(|e| {
                        ProviderError::network(format!("failed to accept redirect: {}", e))
                    })?;
                    debug!(%peer, "redirect connection");
                    connections.push(self.handle_connection(stream));
                }
                Some(outcome) = connections.next(), if !connections.is_empty() => {
                    if let Some(result) = outcome {
                        return result;
                    }
                }
            }
        }
    }

    /// Returns `None` when the request was not the redirect and waiting continues.
    async fn handle_connection(
        &self,
        mut stream: TcpStream,
    ) -> Option<ProviderResult<OAuthCredential>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);

        let request_line =
            match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request(&mut reader)).await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(_) => {
                    debug!("dropping connection that sent no request");
                    return None;
                }
            };

        let redirect = match parse_redirect(&request_line) {
            Some(redirect) => redirect,
            None => {
                respond(&mut writer, "404 Not Found", &message_page("Not found")).await;
                return None;
            }
        };

        let result = match redirect {
            Redirect::Denied(error) => {
                respond(
                    &mut writer,
                    "400 Bad Request",
                    &message_page(&format!("Authorization failed: {}", error)),
                )
                .await;
                Err(ProviderError::authorization_denied(format!(
                    "authorization denied: {}",
                    error
                )))
            }
            Redirect::Empty => {
                respond(
                    &mut writer,
                    "400 Bad Request",
                    &message_page("No authorization code received"),
                )
                .await;
                Err(ProviderError::no_authorization_code(
                    "redirect carried neither code nor error",
                ))
            }
            Redirect::Code(code) => {
                let redirect_uri = self.config.redirect_uri();
                let exchanged = self
                    .client
                    .exchange_code(&code, &redirect_uri)
                    .await
                    .and_then(|tokens| OAuthCredential::from_token_response(tokens, Utc::now()));
                match exchanged {
                    Ok(credential) => {
                        respond(&mut writer, "200 OK", SUCCESS_PAGE).await;
                        Ok(credential)
                    }
                    Err(e) => {
                        respond(
                            &mut writer,
                            "500 Internal Server Error",
                            &message_page("Token exchange failed, check the terminal"),
                        )
                        .await;
                        Err(e)
                    }
                }
            }
        };
        Some(result)
    }
}

/// Reads the request line and drains the headers behind it.
async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<String> {
    let mut request_line = String::new();
    match reader.read_line(&mut request_line).await {
        Ok(0) | Err(_) => return None,
        Ok(_) => {}
    }
    let mut line = String::new();
    for _ in 0..MAX_HEADER_LINES {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) if line.trim().is_empty() => break,
            Ok(_) => {}
        }
    }
    Some(request_line)
}

/// Parses `GET /oauth/callback?... HTTP/1.1`. Returns `None` for any other request.
fn parse_redirect(request_line: &str) -> Option<Redirect> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let url = url::Url::parse("http://localhost").ok()?.join(target).ok()?;
    if url.path() != GoogleConfig::REDIRECT_PATH {
        return None;
    }

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match &*key {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(match (error, code) {
        (Some(error), _) => Redirect::Denied(error),
        (None, Some(code)) => Redirect::Code(code),
        (None, None) => Redirect::Empty,
    })
}

fn message_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>agenda</title></head><body>\
         <h1>{}</h1><p>You can close this tab.</p></body></html>",
        html_escape(message)
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn respond<W: AsyncWrite + Unpin>(writer: &mut W, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = writer.write_all(response.as_bytes()).await {
        debug!(error = %e, "failed to write redirect response");
    }
    let _ = writer.shutdown().await;
}
