//! Local calendar source backed by the `calendar-bridge` helper.
//!
//! The helper is a small native program that reads the operating system's
//! calendar store and prints JSON. [`BridgeSource`] spawns it once per call,
//! bounded by a per-command timeout.

mod config;
mod provider;

pub use config::{BRIDGE_BINARY_NAME, BridgeConfig, discover_binary};
pub use provider::{AuthorizationStatus, BridgeSource};
