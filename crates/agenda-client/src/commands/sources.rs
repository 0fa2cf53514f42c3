//! `agenda sources`: registered sources and their status.

use std::fmt::Write;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::registry::{LOCAL_SOURCE, Registry};

/// Status of one registered source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub name: String,
    pub available: bool,
    /// Calendar IDs the source is restricted to.
    pub filter: Vec<String>,
    /// Source-specific diagnostics.
    pub details: Vec<String>,
}

/// Prints the status of every configured source.
pub async fn run(config: &ClientConfig) -> ClientResult<()> {
    let registry = Registry::from_config(config)?;
    let statuses = collect(&registry).await;
    print!("{}", render(&statuses));
    Ok(())
}

/// Queries availability and diagnostics of every source in `registry`.
pub async fn collect(registry: &Registry) -> Vec<SourceStatus> {
    let mut statuses = Vec::new();
    for name in registry.aggregator.source_names() {
        let Some(source) = registry.aggregator.source(name) else {
            continue;
        };
        let available = source.is_available().await;
        let filter = registry
            .aggregator
            .calendar_filter(name)
            .map(<[String]>::to_vec)
            .unwrap_or_default();

        let mut details = Vec::new();
        if name == LOCAL_SOURCE
            && let Some(ref local) = registry.local
        {
            details.push(format!("binary: {}", local.config().binary_path.display()));
            if available {
                let status = local.check_authorization_status().await;
                details.push(format!("calendar access: {}", status));
            }
        }
        #[cfg(feature = "google")]
        if name == crate::registry::GOOGLE_SOURCE
            && let Some(ref google) = registry.google
        {
            match google.credentials().get_credential() {
                Some(credential) => details.push(format!(
                    "access token expires: {}",
                    credential.expires_at.format("%Y-%m-%d %H:%M UTC")
                )),
                None => details.push("not signed in, run 'agenda auth google'".to_string()),
            }
        }

        statuses.push(SourceStatus {
            name: name.to_string(),
            available,
            filter,
            details,
        });
    }
    statuses
}

/// Renders statuses, one block per source.
pub fn render(statuses: &[SourceStatus]) -> String {
    if statuses.is_empty() {
        return "No calendar sources configured.\n".to_string();
    }
    let mut out = String::new();
    for status in statuses {
        let state = if status.available {
            "available"
        } else {
            "unavailable"
        };
        let _ = writeln!(out, "{:<8}{}", status.name, state);
        if !status.filter.is_empty() {
            let _ = writeln!(out, "        calendars: {}", status.filter.join(", "));
        }
        for detail in &status.details {
            let _ = writeln!(out, "        {}", detail);
        }
    }
    out
}
