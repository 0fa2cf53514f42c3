//! Aggregation across registered calendar sources.
//!
//! The [`Aggregator`] owns the named source registrations and merges their
//! output. A source that is unavailable is skipped; a source that fails is
//! isolated and recorded. Neither ever fails the aggregate call.

use std::collections::HashSet;
use std::sync::Arc;

use agenda_core::{NormalizedCalendar, NormalizedEvent, TimeWindow};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::provider::CalendarSource;

/// A named source together with its calendar selection.
struct SourceRegistration {
    name: String,
    source: Arc<dyn CalendarSource>,
    /// Calendar IDs to keep. Empty means every calendar.
    selected_calendar_ids: Vec<String>,
}

/// A source operation that failed during an aggregate call.
#[derive(Debug)]
pub struct SourceFailure {
    /// The registration name of the failing source.
    pub source: String,
    /// The error the source reported.
    pub error: ProviderError,
}

/// Result of an aggregate call, including what was left out.
#[derive(Debug)]
pub struct AggregateReport<T> {
    /// Items from every source that succeeded.
    pub items: Vec<T>,
    /// Sources skipped because they reported themselves unavailable.
    pub skipped: Vec<String>,
    /// Sources whose operation failed.
    pub failures: Vec<SourceFailure>,
}

impl<T> AggregateReport<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Returns true if no source was skipped or failed.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failures.is_empty()
    }
}

enum Outcome<T> {
    Items(Vec<T>),
    Skipped,
    Failed(ProviderError),
}

/// Orchestrates fetches across every registered [`CalendarSource`].
///
/// Sources are queried concurrently. Results are concatenated in
/// registration order, and events are then stably sorted by start.
#[derive(Default)]
pub struct Aggregator {
    sources: Vec<SourceRegistration>,
}

impl Aggregator {
    /// Creates an aggregator with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under `name`.
    ///
    /// Registering an existing name replaces its adapter in place. The
    /// position and calendar filter of the earlier registration are kept.
    pub fn register_source(&mut self, name: impl Into<String>, source: Arc<dyn CalendarSource>) {
        let name = name.into();
        if let Some(existing) = self.sources.iter_mut().find(|r| r.name == name) {
            debug!(source = %name, "replacing registered source");
            existing.source = source;
            return;
        }
        debug!(source = %name, "registering source");
        self.sources.push(SourceRegistration {
            name,
            source,
            selected_calendar_ids: Vec::new(),
        });
    }

    /// Removes a source and its calendar filter. Returns true if it existed.
    pub fn unregister_source(&mut self, name: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|r| r.name != name);
        self.sources.len() != before
    }

    /// Restricts `name` to the given calendar IDs. An empty list clears the filter.
    ///
    /// Duplicate IDs are collapsed, keeping first-seen order. Returns false
    /// if no source is registered under `name`.
    pub fn set_calendar_filter<I, S>(&mut self, name: &str, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(registration) = self.sources.iter_mut().find(|r| r.name == name) else {
            warn!(source = %name, "calendar filter set for unregistered source");
            return false;
        };
        let mut seen = HashSet::new();
        registration.selected_calendar_ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        true
    }

    /// Returns the calendar filter for `name`, if registered.
    pub fn calendar_filter(&self, name: &str) -> Option<&[String]> {
        self.sources
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.selected_calendar_ids.as_slice())
    }

    /// Returns registered source names in registration order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|r| r.name.as_str()).collect()
    }

    /// Returns the source registered under `name`.
    pub fn source(&self, name: &str) -> Option<Arc<dyn CalendarSource>> {
        self.sources
            .iter()
            .find(|r| r.name == name)
            .map(|r| Arc::clone(&r.source))
    }

    /// Returns the number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Fetches events from every available source, sorted by start.
    ///
    /// Failures are logged and dropped. Use [`fetch_events_report`] to see them.
    ///
    /// [`fetch_events_report`]: Self::fetch_events_report
    pub async fn fetch_events(&self, window: &TimeWindow) -> Vec<NormalizedEvent> {
        self.fetch_events_report(window).await.items
    }

    /// Fetches events and reports which sources were skipped or failed.
    pub async fn fetch_events_report(
        &self,
        window: &TimeWindow,
    ) -> AggregateReport<NormalizedEvent> {
        let outcomes = join_all(
            self.sources
                .iter()
                .map(|registration| fetch_source_events(registration, window.clone())),
        )
        .await;

        let mut report = collect(&self.sources, outcomes);
        // Stable: equal starts keep registration-then-fetch order.
        report.items.sort_by_key(|event| event.start);

        info!(
            events = report.items.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "aggregated events"
        );
        report
    }

    /// Lists calendars from one source, or from every source when `name` is `None`.
    ///
    /// An unregistered `name` yields an empty list.
    pub async fn fetch_calendars(&self, name: Option<&str>) -> Vec<NormalizedCalendar> {
        self.fetch_calendars_report(name).await.items
    }

    /// Lists calendars and reports which sources were skipped or failed.
    pub async fn fetch_calendars_report(
        &self,
        name: Option<&str>,
    ) -> AggregateReport<NormalizedCalendar> {
        let selected: Vec<&SourceRegistration> = match name {
            Some(name) => self.sources.iter().filter(|r| r.name == name).collect(),
            None => self.sources.iter().collect(),
        };
        if selected.is_empty() {
            if let Some(name) = name {
                debug!(source = %name, "calendars requested for unregistered source");
            }
            return AggregateReport::empty();
        }

        let outcomes = join_all(selected.iter().map(|r| fetch_source_calendars(r))).await;
        let report = collect(selected.into_iter(), outcomes);

        info!(
            calendars = report.items.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "aggregated calendars"
        );
        report
    }
}

async fn fetch_source_events(
    registration: &SourceRegistration,
    window: TimeWindow,
) -> Outcome<NormalizedEvent> {
    let name = registration.name.as_str();
    if !registration.source.is_available().await {
        info!(source = %name, "source unavailable, skipping");
        return Outcome::Skipped;
    }

    let events = match registration.source.get_events(window).await {
        Ok(events) => events,
        Err(e) => return failed(name, "failed to fetch events", e),
    };

    if registration.selected_calendar_ids.is_empty() {
        debug!(source = %name, count = events.len(), "fetched events");
        return Outcome::Items(events);
    }

    // Events carry the calendar name, not its ID, so the filter is resolved
    // through the source's calendar list.
    let calendars = match registration.source.get_calendars().await {
        Ok(calendars) => calendars,
        Err(e) => return failed(name, "failed to resolve calendar filter", e),
    };
    let allowed = resolve_calendar_names(&registration.selected_calendar_ids, &calendars);
    let fetched = events.len();
    let kept: Vec<NormalizedEvent> = events
        .into_iter()
        .filter(|event| allowed.contains(event.calendar_name.as_str()))
        .collect();

    debug!(source = %name, fetched, kept = kept.len(), "fetched and filtered events");
    Outcome::Items(kept)
}

async fn fetch_source_calendars(registration: &SourceRegistration) -> Outcome<NormalizedCalendar> {
    let name = registration.name.as_str();
    if !registration.source.is_available().await {
        info!(source = %name, "source unavailable, skipping");
        return Outcome::Skipped;
    }
    match registration.source.get_calendars().await {
        Ok(calendars) => Outcome::Items(calendars),
        Err(e) => failed(name, "failed to list calendars", e),
    }
}

fn failed<T>(source: &str, message: &str, error: ProviderError) -> Outcome<T> {
    warn!(
        source = %source,
        error = %error,
        retryable = error.is_retryable(),
        "{}", message
    );
    Outcome::Failed(error.with_provider(source))
}

/// Maps selected calendar IDs to the names of those calendars.
fn resolve_calendar_names<'a>(
    selected_ids: &[String],
    calendars: &'a [NormalizedCalendar],
) -> HashSet<&'a str> {
    calendars
        .iter()
        .filter(|calendar| selected_ids.contains(&calendar.id))
        .map(|calendar| calendar.name.as_str())
        .collect()
}

fn collect<'a, T>(
    registrations: impl IntoIterator<Item = &'a SourceRegistration>,
    outcomes: Vec<Outcome<T>>,
) -> AggregateReport<T> {
    let mut report = AggregateReport::empty();
    for (registration, outcome) in registrations.into_iter().zip(outcomes) {
        match outcome {
            Outcome::Items(items) => report.items.extend(items),
            Outcome::Skipped => report.skipped.push(registration.name.clone()),
            Outcome::Failed(error) => report.failures.push(SourceFailure {
                source: registration.name.clone(),
                error,
            }),
        }
    }
    report
}
