//! Subcommand implementations.

#[cfg(feature = "google")]
pub mod auth;
pub mod calendars;
pub mod config;
pub mod events;
pub mod sources;

use agenda_providers::AggregateReport;

/// Prints the sources that failed during an aggregate fetch to stderr.
///
/// Partial results are still shown; failures only add a warning line.
pub(crate) fn report_failures<T>(report: &AggregateReport<T>) {
    for failure in &report.failures {
        eprintln!("warning: source '{}' failed: {}", failure.source, failure.error);
        if failure.error.code().needs_reauthorization() {
            eprintln!("         run 'agenda auth {}' to sign in again", failure.source);
        }
    }
}
