//! Calendar sources and the aggregation engine.
//!
//! - [`CalendarSource`] - the capability every calendar backend implements
//! - [`Aggregator`] - fans a query out to every registered source and merges
//!   the results into one list ordered by start time
//! - [`ProviderError`] - error taxonomy shared by all sources
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐
//! │ Google Calendar │    │ calendar-bridge  │
//! └────────┬────────┘    └────────┬─────────┘
//!          │                      │
//!          ▼                      ▼
//! ┌─────────────────┐    ┌─────────────────┐
//! │  GoogleSource   │    │  BridgeSource   │
//! └────────┬────────┘    └────────┬────────┘
//!          │                      │
//!          │    CalendarSource    │
//!          └──────────┬───────────┘
//!                     │
//!                     ▼
//!              ┌─────────────┐
//!              │ Aggregator  │
//!              └──────┬──────┘
//!                     │
//!                     ▼ sorted by start
//!            ┌──────────────────┐
//!            │ NormalizedEvent  │
//!            └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use agenda_core::TimeWindow;
//! use agenda_providers::Aggregator;
//!
//! let mut aggregator = Aggregator::new();
//! aggregator.register_source("google", Arc::new(google));
//! aggregator.register_source("local", Arc::new(bridge));
//!
//! let events = aggregator.fetch_events(&TimeWindow::upcoming_days(now, &Local, 7)).await;
//! ```

pub mod aggregator;
#[cfg(feature = "bridge")]
pub mod bridge;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod provider;

pub use aggregator::{AggregateReport, Aggregator, SourceFailure};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{BoxFuture, CalendarSource};
