//! `agenda events`: upcoming events from every source.

use std::collections::BTreeMap;
use std::fmt::{Display, Write};

use agenda_core::{NormalizedEvent, TimeWindow};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::cli::EventsArgs;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::registry::Registry;

/// Fetches and prints the events of the next `days` days, starting today.
pub async fn run(config: &ClientConfig, args: EventsArgs) -> ClientResult<()> {
    let days = args.days.unwrap_or(config.display.days_to_show);
    if days == 0 {
        return Err(ClientError::Config("days to show must be at least 1".to_string()));
    }

    let registry = Registry::from_config(config)?;
    if registry.aggregator.is_empty() {
        eprintln!("No calendar sources configured. See 'agenda config path'.");
    }

    let window = TimeWindow::upcoming_days(Utc::now(), &Local, days);
    debug!(start = %window.start, end = %window.end, "fetching events");
    let report = registry.aggregator.fetch_events_report(&window).await;
    super::report_failures(&report);

    let show_all_day = config.display.show_all_day && !args.no_all_day;
    let events = select(report.items, show_all_day);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print!("{}", render(&events, &Local));
    }
    Ok(())
}

fn select(events: Vec<NormalizedEvent>, show_all_day: bool) -> Vec<NormalizedEvent> {
    events
        .into_iter()
        .filter(|e| show_all_day || !e.is_all_day)
        .collect()
}

/// Renders events grouped by day in `tz`.
///
/// All-day events keep their calendar date; timed events are placed on the
/// day they start in `tz`.
pub fn render<Tz>(events: &[NormalizedEvent], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if events.is_empty() {
        return "No upcoming events.\n".to_string();
    }

    let mut days: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for event in events {
        let (day, when) = if event.is_all_day {
            (event.start_date(), "all day".to_string())
        } else {
            let start = event.start.with_timezone(tz);
            let end = event.end.with_timezone(tz);
            (
                start.date_naive(),
                format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")),
            )
        };

        let mut line = format!("  {:<11}  {}", when, event.title);
        if let Some(ref location) = event.location {
            let _ = write!(line, " @ {}", location);
        }
        let _ = write!(line, "  [{}]", event.calendar_name);
        days.entry(day).or_default().push(line);
    }

    let mut out = String::new();
    for (index, (day, lines)) in days.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", day.format("%a %d %b"));
        for line in lines {
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_core::SourceTag;
    use chrono::FixedOffset;

    fn events() -> Vec<NormalizedEvent> {
        vec![
            NormalizedEvent::all_day(
                "trip",
                "Trip",
                NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(),
                "Home",
                SourceTag::Local,
            ),
            NormalizedEvent::timed(
                "dentist",
                "Dentist",
                Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap(),
                "Home",
                SourceTag::Local,
            )
            .with_location(Some("Main St".to_string())),
            NormalizedEvent::timed(
                "late",
                "Late call",
                Utc.with_ymd_and_hms(2025, 3, 10, 23, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap(),
                "Work",
                SourceTag::Remote,
            ),
        ]
    }

    #[test]
    fn render_groups_by_day() {
        let out = render(&events(), &Utc);
        assert_eq!(
            out,
            "Mon 10 Mar\n\
             \x20 all day      Trip  [Home]\n\
             \x20 09:00-09:30  Dentist @ Main St  [Home]\n\
             \x20 23:30-00:00  Late call  [Work]\n"
        );
    }

    #[test]
    fn render_uses_local_day_for_timed_events() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let out = render(&events(), &tz);
        assert_eq!(
            out,
            "Mon 10 Mar\n\
             \x20 all day      Trip  [Home]\n\
             \x20 11:00-11:30  Dentist @ Main St  [Home]\n\
             \n\
             Tue 11 Mar\n\
             \x20 01:30-02:00  Late call  [Work]\n"
        );
    }

    #[test]
    fn render_empty() {
        assert_eq!(render(&[], &Utc), "No upcoming events.\n");
    }

    #[test]
    fn select_hides_all_day() {
        let kept = select(events(), false);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|e| !e.is_all_day));
        assert_eq!(select(events(), true).len(), 3);
    }

    #[tokio::test]
    async fn zero_days_is_rejected() {
        let args = EventsArgs {
            days: Some(0),
            ..Default::default()
        };
        let err = run(&ClientConfig::default(), args).await.unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
