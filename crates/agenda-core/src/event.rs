//! Normalized calendar types.
//!
//! Every calendar source maps its raw records into these types before
//! aggregation:
//! - [`NormalizedEvent`]: A source-agnostic event
//! - [`NormalizedCalendar`]: A source-agnostic calendar, also the key-space
//!   for calendar selection
//! - [`SourceTag`]: Which kind of backend produced a record

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The kind of backend an event or calendar came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    /// A remote, OAuth2-protected calendar service.
    Remote,
    /// A local calendar store reached through a helper process.
    Local,
}

impl SourceTag {
    /// Returns the lowercase name of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar event in the shared schema.
///
/// Events are built fresh on every fetch and never mutated afterwards.
/// For all-day events both instants sit on midnight UTC of their date, so
/// they carry no time-of-day component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Identifier, unique within the producing source.
    pub id: String,
    /// Event title.
    pub title: String,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
    /// Whether this is an all-day event.
    pub is_all_day: bool,
    /// Event location, if any.
    pub location: Option<String>,
    /// Free-form notes or description.
    pub notes: Option<String>,
    /// Display name of the calendar holding this event.
    pub calendar_name: String,
    /// Display color of the calendar, if known.
    pub calendar_color: Option<String>,
    /// The backend that produced this event.
    pub source: SourceTag,
}

impl NormalizedEvent {
    /// Creates a timed event.
    pub fn timed(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        calendar_name: impl Into<String>,
        source: SourceTag,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            is_all_day: false,
            location: None,
            notes: None,
            calendar_name: calendar_name.into(),
            calendar_color: None,
            source,
        }
    }

    /// Creates an all-day event spanning `start_date` to `end_date`.
    ///
    /// Both dates are pinned to midnight UTC.
    pub fn all_day(
        id: impl Into<String>,
        title: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        calendar_name: impl Into<String>,
        source: SourceTag,
    ) -> Self {
        let mut event = Self::timed(
            id,
            title,
            midnight_utc(start_date),
            midnight_utc(end_date),
            calendar_name,
            source,
        );
        event.is_all_day = true;
        event
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Builder method to set the notes.
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Builder method to set the calendar color.
    pub fn with_calendar_color(mut self, color: Option<String>) -> Self {
        self.calendar_color = color;
        self
    }

    /// Returns true if the event satisfies `start <= end`.
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }

    /// Returns the start date (UTC).
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

/// A calendar in the shared schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCalendar {
    /// Identifier, unique within the producing source.
    pub id: String,
    /// Display name. Events reference their calendar by this name.
    pub name: String,
    /// Display color, if known.
    pub color: Option<String>,
    /// The backend that produced this calendar.
    pub source: SourceTag,
    /// Account the calendar belongs to, if the source knows it.
    pub account_label: Option<String>,
}

impl NormalizedCalendar {
    /// Creates a new calendar with the given ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: SourceTag) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: None,
            source,
            account_label: None,
        }
    }

    /// Builder method to set the color.
    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }

    /// Builder method to set the account label.
    pub fn with_account_label(mut self, label: impl Into<String>) -> Self {
        self.account_label = Some(label.into());
        self
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
