//! OAuth credential state and refresh.
//!
//! [`CredentialManager`] owns the credential for one Google source. It
//! hands out access tokens, refreshing them through the token endpoint when
//! they are within five minutes of expiry, and notifies a rotation callback
//! so the new credential can be persisted.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::oauth::{OAuthClient, TokenResponse};

/// Refresh once the token is this close to expiring.
const REFRESH_BUFFER_SECS: i64 = 300;

/// An OAuth access/refresh token pair.
///
/// Serialized with `expiry_date` in epoch milliseconds, which is the
/// on-disk credential format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires.
    #[serde(rename = "expiry_date", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthCredential {
    /// Builds a credential from a token endpoint response received at `now`.
    ///
    /// The expiry is truncated to milliseconds, the precision it is persisted with.
    pub fn from_token_response(
        response: TokenResponse,
        now: DateTime<Utc>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            expires_at: expiry_after(now, response.expires_in)?,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            scope: response.scope.unwrap_or_default(),
        })
    }

    /// Returns true once `now` is inside the refresh buffer before expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(REFRESH_BUFFER_SECS)
    }

    /// Applies a refresh response, keeping the refresh token and scope
    /// unless the endpoint returned new ones.
    fn refreshed(&self, response: TokenResponse, now: DateTime<Utc>) -> ProviderResult<Self> {
        Ok(Self {
            expires_at: expiry_after(now, response.expires_in)?,
            access_token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            token_type: response.token_type,
            scope: response.scope.unwrap_or_else(|| self.scope.clone()),
        })
    }
}

/// `now + expires_in` seconds, truncated to whole milliseconds.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> ProviderResult<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .and_then(|expiry| DateTime::from_timestamp_millis(expiry.timestamp_millis()))
        .ok_or_else(|| {
            ProviderError::invalid_response(format!(
                "token endpoint returned an out-of-range expires_in: {}",
                expires_in
            ))
        })
}

/// Invoked with the new credential after every successful refresh.
pub type RotationCallback = Arc<dyn Fn(&OAuthCredential) + Send + Sync>;

/// Owns the credential of one remote source.
pub struct CredentialManager {
    client: OAuthClient,
    credential: RwLock<Option<OAuthCredential>>,
    /// Held for the duration of a refresh so concurrent callers share it.
    refresh_lock: Mutex<()>,
    on_rotate: Option<RotationCallback>,
}

impl CredentialManager {
    /// Creates a manager with no credential.
    pub fn new(client: OAuthClient) -> Self {
        Self {
            client,
            credential: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            on_rotate: None,
        }
    }

    /// Registers the callback notified after each refresh.
    pub fn with_rotation_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&OAuthCredential) + Send + Sync + 'static,
    {
        self.on_rotate = Some(Arc::new(callback));
        self
    }

    /// Replaces the stored credential.
    pub fn set_credential(&self, credential: OAuthCredential) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    /// Returns a copy of the stored credential, if any.
    pub fn get_credential(&self) -> Option<OAuthCredential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forgets the stored credential.
    pub fn clear(&self) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Returns a usable access token, refreshing first if needed.
    ///
    /// # Errors
    ///
    /// - `CredentialMissing` if no credential was ever set
    /// - `RefreshFailed` if there is no refresh token or the token endpoint
    ///   rejects it. The stored credential is left untouched.
    pub async fn ensure_valid_access_token(&self) -> ProviderResult<String> {
        let current = self.require_credential()?;
        if !current.needs_refresh(Utc::now()) {
            return Ok(current.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        let current = self.require_credential()?;
        if !current.needs_refresh(Utc::now()) {
            debug!("access token already refreshed by a concurrent caller");
            return Ok(current.access_token);
        }

        let refresh_token = current.refresh_token.as_deref().ok_or_else(|| {
            ProviderError::refresh_failed("access token expired and no refresh token is stored")
        })?;

        debug!(expires_at = %current.expires_at, "refreshing access token");
        let response = self.client.refresh(refresh_token).await.map_err(|e| {
            warn!(error = %e, "access token refresh failed");
            ProviderError::refresh_failed(format!("token refresh failed: {}", e.message()))
                .with_source(e)
        })?;

        let refreshed = current.refreshed(response, Utc::now())?;
        self.set_credential(refreshed.clone());
        info!(expires_at = %refreshed.expires_at, "refreshed access token");

        if let Some(ref callback) = self.on_rotate {
            callback(&refreshed);
        }
        Ok(refreshed.access_token)
    }

    fn require_credential(&self) -> ProviderResult<OAuthCredential> {
        self.get_credential().ok_or_else(|| {
            ProviderError::credential_missing("no Google credential, run 'agenda auth google'")
        })
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("has_credential", &self.get_credential().is_some())
            .field("has_rotation_callback", &self.on_rotate.is_some())
            .finish()
    }
}
