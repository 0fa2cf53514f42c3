//! [`CalendarSource`] backed by the `calendar-bridge` helper process.
//!
//! The bridge prints JSON on stdout:
//!
//! | Command | Output |
//! |---|---|
//! | `events --start <ISO> --end <ISO>` | `[{id, title, startDate, endDate, isAllDay, location?, notes?, calendarName, calendarColor?}]` |
//! | `calendars` | `[{id, name, color?}]` |
//! | `check-auth` | `{status}` |

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use agenda_core::{NormalizedCalendar, NormalizedEvent, SourceTag, TimeWindow};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarSource};

use super::config::BridgeConfig;

/// Calendar access status reported by `check-auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    Granted,
    Denied,
    NotDetermined,
    Restricted,
    Unknown,
}

impl AuthorizationStatus {
    fn from_status(status: &str) -> Self {
        match status {
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            "notDetermined" => Self::NotDetermined,
            "restricted" => Self::Restricted,
            _ => Self::Unknown,
        }
    }

    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::NotDetermined => "notDetermined",
            Self::Restricted => "restricted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBridgeEvent {
    id: String,
    #[serde(default)]
    title: String,
    start_date: String,
    end_date: String,
    #[serde(default)]
    is_all_day: bool,
    location: Option<String>,
    notes: Option<String>,
    #[serde(default)]
    calendar_name: String,
    calendar_color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBridgeCalendar {
    id: String,
    name: String,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAuthStatus {
    status: Option<String>,
}

/// Local calendar source that shells out to the bridge helper.
#[derive(Debug, Clone)]
pub struct BridgeSource {
    config: BridgeConfig,
}

impl BridgeSource {
    /// Creates a source for the configured bridge binary.
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration of this source.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Reports whether the host platform and binary allow running the bridge.
    pub fn check_available(&self) -> bool {
        if std::env::consts::OS != self.config.required_os {
            debug!(
                os = std::env::consts::OS,
                required = %self.config.required_os,
                "bridge not supported on this platform"
            );
            return false;
        }
        if !is_executable(&self.config.binary_path) {
            debug!(
                path = %self.config.binary_path.display(),
                "bridge binary missing or not executable"
            );
            return false;
        }
        true
    }

    /// Asks the bridge whether calendar access was granted.
    ///
    /// Diagnostic only: every failure reads as [`AuthorizationStatus::Unknown`].
    pub async fn check_authorization_status(&self) -> AuthorizationStatus {
        match self
            .call::<RawAuthStatus>(&["check-auth"], self.config.auth_check_timeout)
            .await
        {
            Ok(raw) => raw
                .status
                .as_deref()
                .map(AuthorizationStatus::from_status)
                .unwrap_or(AuthorizationStatus::Unknown),
            Err(e) => {
                debug!(error = %e, "check-auth failed");
                AuthorizationStatus::Unknown
            }
        }
    }

    async fn fetch_events(&self, window: TimeWindow) -> ProviderResult<Vec<NormalizedEvent>> {
        let start = window.start.to_rfc3339_opts(SecondsFormat::Millis, true);
        let end = window.end.to_rfc3339_opts(SecondsFormat::Millis, true);
        let raw: Vec<RawBridgeEvent> = self
            .call(
                &["events", "--start", &start, "--end", &end],
                self.config.events_timeout,
            )
            .await?;

        let fetched = raw.len();
        let events: Vec<NormalizedEvent> = raw.into_iter().filter_map(convert_event).collect();
        debug!(fetched, kept = events.len(), "fetched bridge events");
        Ok(events)
    }

    async fn fetch_calendars(&self) -> ProviderResult<Vec<NormalizedCalendar>> {
        let raw: Vec<RawBridgeCalendar> = self
            .call(&["calendars"], self.config.calendars_timeout)
            .await?;
        Ok(raw
            .into_iter()
            .map(|c| NormalizedCalendar::new(c.id, c.name, SourceTag::Local).with_color(c.color))
            .collect())
    }

    /// Runs one bridge command and parses its stdout as JSON.
    async fn call<T: DeserializeOwned>(&self, args: &[&str], limit: Duration) -> ProviderResult<T> {
        let subcommand = args.first().copied().unwrap_or_default();
        let binary = &self.config.binary_path;

        let mut command = Command::new(binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(limit, command.output())
            .await
            .map_err(|_| {
                ProviderError::subprocess(format!(
                    "bridge `{}` timed out after {}ms",
                    subcommand,
                    limit.as_millis()
                ))
            })?
            .map_err(|e| {
                ProviderError::subprocess(format!(
                    "failed to run {}: {}",
                    binary.display(),
                    e
                ))
                .with_source(e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::subprocess(format!(
                "bridge `{}` exited with {}: {}",
                subcommand,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ProviderError::invalid_response(format!(
                "bridge `{}` printed invalid JSON: {}",
                subcommand, e
            ))
        })
    }
}

impl CalendarSource for BridgeSource {
    fn is_available(&self) -> BoxFuture<'_, bool> {
        let available = self.check_available();
        Box::pin(async move { available })
    }

    fn get_events(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'_, ProviderResult<Vec<NormalizedEvent>>> {
        Box::pin(self.fetch_events(window))
    }

    fn get_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<NormalizedCalendar>>> {
        Box::pin(self.fetch_calendars())
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Parses a bridge timestamp: RFC 3339, or a bare `YYYY-MM-DD` taken as UTC midnight.
fn parse_bridge_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset())
}

fn convert_event(raw: RawBridgeEvent) -> Option<NormalizedEvent> {
    let (Some(start), Some(end)) = (
        parse_bridge_time(&raw.start_date),
        parse_bridge_time(&raw.end_date),
    ) else {
        warn!(
            event = %raw.id,
            start = %raw.start_date,
            end = %raw.end_date,
            "skipping bridge event with unparseable dates"
        );
        return None;
    };

    let event = if raw.is_all_day {
        // The calendar day is the one in the timestamp's own offset.
        NormalizedEvent::all_day(
            raw.id,
            raw.title,
            start.date_naive(),
            end.date_naive(),
            raw.calendar_name,
            SourceTag::Local,
        )
    } else {
        NormalizedEvent::timed(
            raw.id,
            raw.title,
            start.to_utc(),
            end.to_utc(),
            raw.calendar_name,
            SourceTag::Local,
        )
    };
    let event = event
        .with_location(raw.location)
        .with_notes(raw.notes)
        .with_calendar_color(raw.calendar_color);

    if !event.is_well_formed() {
        warn!(event = %event.id, "skipping bridge event that ends before it starts");
        return None;
    }
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parse_bridge_times() {
        let dt = parse_bridge_time("2025-03-10T09:00:00.000Z").unwrap();
        assert_eq!(dt.to_utc(), Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap());

        let dt = parse_bridge_time("2025-03-10").unwrap();
        assert_eq!(dt.to_utc(), Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());

        assert!(parse_bridge_time("next tuesday").is_none());
    }

    #[test]
    fn all_day_uses_local_calendar_day() {
        let raw: RawBridgeEvent = serde_json::from_str(
            r#"{
                "id": "h1",
                "title": "Holiday",
                "startDate": "2025-03-12T00:00:00+09:00",
                "endDate": "2025-03-12T23:59:59+09:00",
                "isAllDay": true,
                "calendarName": "Home"
            }"#,
        )
        .unwrap();
        let event = convert_event(raw).unwrap();
        assert!(event.is_all_day);
        assert_eq!(event.start_date(), NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap());
        assert_eq!(event.source, SourceTag::Local);
    }

    #[test]
    fn authorization_status_names() {
        assert_eq!(
            AuthorizationStatus::from_status("notDetermined"),
            AuthorizationStatus::NotDetermined
        );
        assert_eq!(AuthorizationStatus::from_status("whatever"), AuthorizationStatus::Unknown);
        assert_eq!(AuthorizationStatus::Restricted.to_string(), "restricted");
    }

    #[tokio::test]
    async fn unavailable_on_other_platform() {
        let source = BridgeSource::new(
            BridgeConfig::new("/bin/sh").with_required_os("not-a-real-os"),
        );
        assert!(!source.is_available().await);
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let source = BridgeSource::new(
            BridgeConfig::new(dir.path().join("calendar-bridge"))
                .with_required_os(std::env::consts::OS),
        );
        assert!(!source.is_available().await);
        assert_eq!(source.check_authorization_status().await, AuthorizationStatus::Unknown);

        let err = source.get_calendars().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::SubprocessFailed);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        fn fake_bridge(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("calendar-bridge");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn source(path: PathBuf) -> BridgeSource {
            BridgeSource::new(BridgeConfig::new(path).with_required_os(std::env::consts::OS))
        }

        fn window() -> TimeWindow {
            TimeWindow::new(
                Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap(),
            )
        }

        const EVENTS_JSON: &str = r##"[
  {"id":"e1","title":"Dentist","startDate":"2025-03-10T09:00:00.000Z","endDate":"2025-03-10T09:30:00.000Z","isAllDay":false,"location":"Main St","calendarName":"Home","calendarColor":"#ff2968"},
  {"id":"e2","title":"Trip","startDate":"2025-03-14","endDate":"2025-03-15","isAllDay":true,"notes":"pack","calendarName":"Home"},
  {"id":"e3","title":"Broken","startDate":"yesterday","endDate":"today","isAllDay":false,"calendarName":"Home"}
]"##;

        #[tokio::test]
        async fn executable_bridge_is_available() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_bridge(dir.path(), "exit 0");
            assert!(source(path.clone()).is_available().await);

            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
            assert!(!source(path).is_available().await);
        }

        #[tokio::test]
        async fn events_are_parsed_and_arguments_passed() {
            let dir = tempfile::tempdir().unwrap();
            let args_file = dir.path().join("args");
            let body = format!(
                "echo \"$@\" > '{}'\ncat <<'EOF'\n{}\nEOF",
                args_file.display(),
                EVENTS_JSON
            );
            let source = source(fake_bridge(dir.path(), &body));

            let events = source.get_events(window()).await.unwrap();
            assert_eq!(events.len(), 2);

            let dentist = &events[0];
            assert_eq!(dentist.title, "Dentist");
            assert_eq!(dentist.start, Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap());
            assert_eq!(dentist.location.as_deref(), Some("Main St"));
            assert_eq!(dentist.calendar_color.as_deref(), Some("#ff2968"));
            assert_eq!(dentist.source, SourceTag::Local);

            let trip = &events[1];
            assert!(trip.is_all_day);
            assert_eq!(trip.notes.as_deref(), Some("pack"));
            assert_eq!(trip.start_date(), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());

            let args = std::fs::read_to_string(&args_file).unwrap();
            assert_eq!(
                args.trim(),
                "events --start 2025-03-10T00:00:00.000Z --end 2025-03-17T00:00:00.000Z"
            );
        }

        #[tokio::test]
        async fn calendars_are_mapped() {
            let dir = tempfile::tempdir().unwrap();
            let source = source(fake_bridge(
                dir.path(),
                r##"echo '[{"id":"c1","name":"Home","color":"#ff2968"},{"id":"c2","name":"Work"}]'"##,
            ));

            let calendars = source.get_calendars().await.unwrap();
            assert_eq!(calendars.len(), 2);
            assert_eq!(calendars[0].name, "Home");
            assert_eq!(calendars[0].color.as_deref(), Some("#ff2968"));
            assert_eq!(calendars[1].source, SourceTag::Local);
            assert!(calendars[1].account_label.is_none());
        }

        #[tokio::test]
        async fn non_zero_exit_is_a_subprocess_failure() {
            let dir = tempfile::tempdir().unwrap();
            let source = source(fake_bridge(dir.path(), "echo 'access denied' >&2\nexit 3"));

            let err = source.get_events(window()).await.unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::SubprocessFailed);
            assert!(err.message().contains("access denied"));
        }

        #[tokio::test]
        async fn invalid_json_is_reported() {
            let dir = tempfile::tempdir().unwrap();
            let source = source(fake_bridge(dir.path(), "echo 'not json'"));

            let err = source.get_calendars().await.unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
        }

        #[tokio::test]
        async fn slow_bridge_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_bridge(dir.path(), "sleep 5\necho '[]'");
            let source = BridgeSource::new(
                BridgeConfig::new(path)
                    .with_required_os(std::env::consts::OS)
                    .with_events_timeout(Duration::from_millis(200)),
            );

            let err = source.get_events(window()).await.unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::SubprocessFailed);
            assert!(err.message().contains("timed out"));
        }

        #[tokio::test]
        async fn check_auth_statuses() {
            let dir = tempfile::tempdir().unwrap();
            let granted = source(fake_bridge(dir.path(), r#"echo '{"status":"granted"}'"#));
            assert_eq!(granted.check_authorization_status().await, AuthorizationStatus::Granted);

            let dir = tempfile::tempdir().unwrap();
            let pending = source(fake_bridge(dir.path(), r#"echo '{"status":"notDetermined"}'"#));
            assert_eq!(
                pending.check_authorization_status().await,
                AuthorizationStatus::NotDetermined
            );

            let dir = tempfile::tempdir().unwrap();
            let garbage = source(fake_bridge(dir.path(), "echo garbage"));
            assert_eq!(garbage.check_authorization_status().await, AuthorizationStatus::Unknown);

            let dir = tempfile::tempdir().unwrap();
            let failing = source(fake_bridge(dir.path(), "exit 1"));
            assert_eq!(failing.check_authorization_status().await, AuthorizationStatus::Unknown);
        }
    }
}
