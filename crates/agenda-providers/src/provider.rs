//! The [`CalendarSource`] capability trait.
//!
//! Every backend (the Google API adapter, the local bridge adapter, test
//! fakes) implements the same three operations. The [`Aggregator`] only ever
//! holds sources behind `Arc<dyn CalendarSource>`.
//!
//! [`Aggregator`]: crate::aggregator::Aggregator

use std::future::Future;
use std::pin::Pin;

use agenda_core::{NormalizedCalendar, NormalizedEvent, TimeWindow};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxing keeps the trait object-safe so sources can be stored as
/// `dyn CalendarSource`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A backend that can report calendars and events in the normalized schema.
///
/// # Implementation Notes
///
/// - `is_available` must be cheap and side-effect free. It is consulted
///   before every fetch and a `false` answer makes the aggregator skip the
///   source without treating it as a failure.
/// - `get_events` returns events overlapping the window. Each event's
///   `calendar_name` must match the `name` of a calendar returned by
///   `get_calendars`, since calendar filters are resolved through names.
/// - Adapters should drop malformed records rather than fail the whole call.
pub trait CalendarSource: Send + Sync {
    /// Reports whether this source can be queried right now.
    fn is_available(&self) -> BoxFuture<'_, bool>;

    /// Fetches events within the given window.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on credential, network or subprocess failures.
    fn get_events(&self, window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<NormalizedEvent>>>;

    /// Lists the calendars this source exposes.
    fn get_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<NormalizedCalendar>>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sources for aggregator tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{ProviderError, ProviderErrorCode};

    /// A source serving canned data, optionally failing.
    pub struct FakeSource {
        pub available: bool,
        pub events: Vec<NormalizedEvent>,
        pub calendars: Vec<NormalizedCalendar>,
        pub events_error: Option<ProviderErrorCode>,
        pub calendars_error: Option<ProviderErrorCode>,
        pub event_calls: AtomicUsize,
        pub calendar_calls: AtomicUsize,
        pub last_window: Mutex<Option<TimeWindow>>,
    }

    impl FakeSource {
        pub fn new(events: Vec<NormalizedEvent>) -> Self {
            Self {
                available: true,
                events,
                calendars: Vec::new(),
                events_error: None,
                calendars_error: None,
                event_calls: AtomicUsize::new(0),
                calendar_calls: AtomicUsize::new(0),
                last_window: Mutex::new(None),
            }
        }

        pub fn with_calendars(mut self, calendars: Vec<NormalizedCalendar>) -> Self {
            self.calendars = calendars;
            self
        }

        pub fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        pub fn failing_events(mut self, code: ProviderErrorCode) -> Self {
            self.events_error = Some(code);
            self
        }

        pub fn failing_calendars(mut self, code: ProviderErrorCode) -> Self {
            self.calendars_error = Some(code);
            self
        }

        pub fn event_calls(&self) -> usize {
            self.event_calls.load(Ordering::SeqCst)
        }

        pub fn calendar_calls(&self) -> usize {
            self.calendar_calls.load(Ordering::SeqCst)
        }
    }

    impl CalendarSource for FakeSource {
        fn is_available(&self) -> BoxFuture<'_, bool> {
            let available = self.available;
            Box::pin(async move { available })
        }

        fn get_events(
            &self,
            window: TimeWindow,
        ) -> BoxFuture<'_, ProviderResult<Vec<NormalizedEvent>>> {
            Box::pin(async move {
                self.event_calls.fetch_add(1, Ordering::SeqCst);
                *self.last_window.lock().unwrap() = Some(window);
                match self.events_error {
                    Some(code) => Err(ProviderError::new(code, "fake events failure")),
                    None => Ok(self.events.clone()),
                }
            })
        }

        fn get_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<NormalizedCalendar>>> {
            Box::pin(async move {
                self.calendar_calls.fetch_add(1, Ordering::SeqCst);
                match self.calendars_error {
                    Some(code) => Err(ProviderError::new(code, "fake calendars failure")),
                    None => Ok(self.calendars.clone()),
                }
            })
        }
    }
}
