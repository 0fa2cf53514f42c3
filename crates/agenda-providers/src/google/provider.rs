//! [`CalendarSource`] implementation for Google Calendar.

use agenda_core::{NormalizedCalendar, NormalizedEvent, SourceTag, TimeWindow};
use chrono::Duration;
use tracing::{debug, warn};

use crate::error::ProviderResult;
use crate::provider::{BoxFuture, CalendarSource};

use super::client::{ApiEvent, CalendarListEntry, GoogleCalendarClient};
use super::config::GoogleConfig;
use super::oauth::{AuthorizationFlow, OAuthClient};
use super::tokens::{CredentialManager, OAuthCredential};

/// Title used for events without a summary.
const UNTITLED_EVENT: &str = "Untitled Event";

/// Google Calendar source.
///
/// Reads every calendar in the user's calendar list. The credential must be
/// set (from storage, or from an [`AuthorizationFlow`]) before the source
/// reports itself available.
#[derive(Debug)]
pub struct GoogleSource {
    config: GoogleConfig,
    client: GoogleCalendarClient,
    credentials: CredentialManager,
}

impl GoogleSource {
    /// Creates a source with no credential.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;
        let client = GoogleCalendarClient::new(&config)?;
        let credentials = CredentialManager::new(OAuthClient::new(&config)?);
        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    /// Registers the callback notified whenever the access token is refreshed.
    pub fn with_rotation_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&OAuthCredential) + Send + Sync + 'static,
    {
        self.credentials = self.credentials.with_rotation_callback(callback);
        self
    }

    /// Sets the credential, typically loaded from persistent storage.
    pub fn set_credential(&self, credential: OAuthCredential) {
        self.credentials.set_credential(credential);
    }

    /// Returns the credential manager of this source.
    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Returns the configuration of this source.
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Creates an authorization flow sharing this source's configuration.
    pub fn authorization_flow(&self) -> ProviderResult<AuthorizationFlow> {
        AuthorizationFlow::new(self.config.clone())
    }

    async fn fetch_events(&self, window: TimeWindow) -> ProviderResult<Vec<NormalizedEvent>> {
        let token = self.credentials.ensure_valid_access_token().await?;
        let calendars = self.client.list_calendars(&token).await?;

        let mut events = Vec::new();
        for calendar in &calendars {
            match self
                .client
                .list_events(&token, &calendar.id, window.start, window.end)
                .await
            {
                Ok(items) => {
                    events.extend(items.into_iter().filter_map(|e| convert_event(e, calendar)));
                }
                // One unreadable calendar does not hide the others.
                Err(e) => {
                    warn!(calendar = %calendar.id, error = %e, "failed to fetch calendar events");
                }
            }
        }

        debug!(
            calendars = calendars.len(),
            events = events.len(),
            "fetched Google events"
        );
        Ok(events)
    }

    async fn fetch_calendars(&self) -> ProviderResult<Vec<NormalizedCalendar>> {
        let token = self.credentials.ensure_valid_access_token().await?;
        let entries = self.client.list_calendars(&token).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                NormalizedCalendar::new(entry.id, entry.summary, SourceTag::Remote)
                    .with_color(entry.background_color)
                    .with_account_label(&self.config.account_name)
            })
            .collect())
    }
}

impl CalendarSource for GoogleSource {
    fn is_available(&self) -> BoxFuture<'_, bool> {
        let available = self
            .credentials
            .get_credential()
            .is_some_and(|c| !c.access_token.is_empty());
        Box::pin(async move { available })
    }

    fn get_events(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'_, ProviderResult<Vec<NormalizedEvent>>> {
        Box::pin(self.fetch_events(window))
    }

    fn get_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<NormalizedCalendar>>> {
        Box::pin(self.fetch_calendars())
    }
}

/// Maps an API event into the normalized schema.
///
/// Returns `None` for cancelled events and for records that cannot be
/// represented (missing ID, unparseable or reversed times).
fn convert_event(event: ApiEvent, calendar: &CalendarListEntry) -> Option<NormalizedEvent> {
    if event.is_cancelled() {
        return None;
    }
    let Some(id) = event.id.clone() else {
        warn!(calendar = %calendar.id, "skipping event without id");
        return None;
    };
    let title = event
        .summary
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNTITLED_EVENT.to_string());

    let normalized = if event.is_all_day() {
        let start = event.start.day()?;
        let end = event
            .end
            .day()
            .unwrap_or_else(|| start + Duration::days(1));
        NormalizedEvent::all_day(id, title, start, end, &calendar.summary, SourceTag::Remote)
    } else {
        let (Some(start), Some(end)) = (event.start.instant(), event.end.instant()) else {
            warn!(event = %id, "skipping event with unparseable times");
            return None;
        };
        NormalizedEvent::timed(id, title, start, end, &calendar.summary, SourceTag::Remote)
    };

    let normalized = normalized
        .with_location(event.location)
        .with_notes(event.description)
        .with_calendar_color(calendar.background_color.clone());

    if !normalized.is_well_formed() {
        warn!(event = %normalized.id, "skipping event that ends before it starts");
        return None;
    }
    Some(normalized)
}
