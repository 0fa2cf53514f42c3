//! The `agenda` command-line client.
//!
//! Loads `config.toml`, registers the configured calendar sources with an
//! [`Aggregator`](agenda_providers::Aggregator) and renders what they return.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod registry;
#[cfg(feature = "google")]
pub mod store;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
