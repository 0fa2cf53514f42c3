//! Google Calendar source.
//!
//! - [`GoogleSource`] implements [`CalendarSource`] over the Calendar API v3
//! - [`CredentialManager`] keeps the access token fresh and reports rotations
//! - [`AuthorizationFlow`] obtains the first credential through a loopback
//!   redirect on `localhost:42813`
//!
//! # Example
//!
//! ```ignore
//! use agenda_providers::google::{GoogleConfig, GoogleSource, OAuthCredentials};
//!
//! let config = GoogleConfig::new(OAuthCredentials::new(client_id, client_secret));
//! let source = GoogleSource::new(config)?
//!     .with_rotation_callback(move |cred| {
//!         if let Err(e) = store.save(cred) {
//!             tracing::warn!(error = %e, "failed to persist refreshed credential");
//!         }
//!     });
//!
//! match store.load()? {
//!     Some(credential) => source.set_credential(credential),
//!     None => source.set_credential(source.authorization_flow()?.run().await?),
//! }
//! ```
//!
//! [`CalendarSource`]: crate::provider::CalendarSource

mod client;
mod config;
mod oauth;
mod provider;
mod tokens;

pub use client::{ApiEvent, ApiEventTime, CalendarListEntry, GoogleCalendarClient};
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{AuthorizationFlow, OAuthClient, TokenResponse};
pub use provider::GoogleSource;
pub use tokens::{CredentialManager, OAuthCredential, RotationCallback};
