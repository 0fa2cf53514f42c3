//! Google Calendar API v3 client.
//!
//! A thin HTTP layer: the calendar list and paginated event listing. The
//! access token is supplied per call, since [`CredentialManager`] may
//! rotate it between requests.
//!
//! [`CredentialManager`]: super::tokens::CredentialManager

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

use super::config::GoogleConfig;

/// Upper bound on pages followed for a single listing.
const MAX_PAGES: usize = 100;

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    /// Creates a client for the configured API base.
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
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Lists the calendars of the authenticated user.
    pub async fn list_calendars(
        &self,
        access_token: &str,
    ) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.api_base);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        for pages in 1.. {
            let mut request = self.http_client.get(&url).bearer_auth(access_token);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: CalendarListResponse = self.send(request).await?;
            entries.extend(page.items);

            page_token = next_page(page_token, page.next_page_token, pages);
            if page_token.is_none() {
                break;
            }
        }

        debug!(count = entries.len(), "listed calendars");
        Ok(entries)
    }

    /// Lists events of one calendar within `[time_min, time_max)`.
    ///
    /// Recurring events are expanded server-side; every page is followed.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> ProviderResult<Vec<ApiEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        );
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for pages in 1.. {
            let mut request = self
                .http_client
                .get(&url)
                .bearer_auth(access_token)
                .query(&[
                    ("timeMin", time_min.to_rfc3339()),
                    ("timeMax", time_max.to_rfc3339()),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                ]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: EventListResponse = self.send(request).await?;
            events.extend(page.items);

            page_token = next_page(page_token, page.next_page_token, pages);
            if page_token.is_none() {
                break;
            }
        }

        debug!(calendar = %calendar_id, count = events.len(), "listed events");
        Ok(events)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ProviderResult<T> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            ProviderError::network(message).with_source(e)
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ProviderError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            )));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::authentication(format!(
                "calendar API rejected the access token ({})",
                status
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::server(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e))
        })?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the events.list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub start: ApiEventTime,
    #[serde(default)]
    pub end: ApiEventTime,
}

impl ApiEvent {
    /// True if the organizer cancelled this event.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// True if the start carries only a date.
    pub fn is_all_day(&self) -> bool {
        self.start.date_time.is_none() && self.start.date.is_some()
    }
}

/// Start or end of an event: `dateTime` for timed events, `date` for all-day ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date: Option<String>,
    pub date_time: Option<String>,
}

impl ApiEventTime {
    /// Parses `dateTime` as an RFC 3339 instant.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Parses `date` as `YYYY-MM-DD`.
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    next_page_token: Option<String>,
}

/// A calendar from the calendar list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    /// The calendar ID.
    pub id: String,
    /// The calendar name.
    #[serde(default)]
    pub summary: String,
    /// Background color, e.g. `#9fe1e7`.
    pub background_color: Option<String>,
}

/// Picks the token of the next page to request, or `None` to stop.
///
/// Stops on a repeated token or after [`MAX_PAGES`] pages.
fn next_page(current: Option<String>, next: Option<String>, pages: usize) -> Option<String> {
    let next = next.filter(|token| !token.is_empty())?;
    if current.as_deref() == Some(next.as_str()) {
        warn!(token = %next, "server repeated the page token, stopping");
        return None;
    }
    if pages >= MAX_PAGES {
        warn!(pages, "page limit reached, results truncated");
        return None;
    }
    Some(next)
}
