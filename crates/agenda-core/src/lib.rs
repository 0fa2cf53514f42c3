//! Core types: normalized events and calendars, time windows, tracing

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{NormalizedCalendar, NormalizedEvent, SourceTag};
pub use time::TimeWindow;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
