//! `agenda calendars`: calendars of every source, or of one.

use std::fmt::Write;

use agenda_core::NormalizedCalendar;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::registry::Registry;

/// Lists calendars, optionally restricted to the source named `source`.
pub async fn run(config: &ClientConfig, source: Option<String>, json: bool) -> ClientResult<()> {
    let registry = Registry::from_config(config)?;

    if let Some(ref name) = source
        && registry.aggregator.source(name).is_none()
    {
        return Err(ClientError::Config(format!(
            "unknown source '{}' (registered: {})",
            name,
            registry.aggregator.source_names().join(", ")
        )));
    }

    let report = registry
        .aggregator
        .fetch_calendars_report(source.as_deref())
        .await;
    super::report_failures(&report);

    if json {
        println!("{}", serde_json::to_string_pretty(&report.items)?);
    } else {
        print!("{}", render(&report.items));
    }
    Ok(())
}

/// Renders one calendar per line: source, name, account and ID.
pub fn render(calendars: &[NormalizedCalendar]) -> String {
    if calendars.is_empty() {
        return "No calendars found.\n".to_string();
    }
    let width = calendars.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for calendar in calendars {
        let _ = write!(
            out,
            "{:<6}  {:<width$}  ",
            calendar.source.as_str(),
            calendar.name,
            width = width
        );
        if let Some(ref account) = calendar.account_label {
            let _ = write!(out, "{}  ", account);
        }
        let _ = writeln!(out, "({})", calendar.id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_core::SourceTag;
    use crate::config::LocalSettings;

    #[test]
    fn render_aligns_names() {
        let calendars = vec![
            NormalizedCalendar::new("c1", "Home", SourceTag::Local),
            NormalizedCalendar::new("work@example.com", "Work stuff", SourceTag::Remote)
                .with_account_label("me@example.com"),
        ];
        assert_eq!(
            render(&calendars),
            "local   Home        (c1)\n\
             remote  Work stuff  me@example.com  (work@example.com)\n"
        );
    }

    #[test]
    fn render_empty() {
        assert_eq!(render(&[]), "No calendars found.\n");
    }

    #[tokio::test]
    async fn unknown_source_is_rejected() {
        let config = ClientConfig {
            local: LocalSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = run(&config, Some("exchange".to_string()), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown source 'exchange'"));
    }
}
