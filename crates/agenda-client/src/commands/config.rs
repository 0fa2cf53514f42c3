//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, config_path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", config_path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    for line in check(config)? {
        println!("{}", line);
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Checks `config`, returning notes about each configured source.
fn check(config: &ClientConfig) -> ClientResult<Vec<String>> {
    let mut notes = Vec::new();

    if config.display.days_to_show == 0 {
        return Err(ClientError::Config(
            "display.days_to_show must be at least 1".to_string(),
        ));
    }

    #[cfg(feature = "google")]
    if let Some(ref google) = config.google {
        if google.selected_calendars.iter().any(|id| id.trim().is_empty()) {
            return Err(ClientError::Config(
                "google.selected_calendars must not contain empty IDs".to_string(),
            ));
        }
        google
            .to_provider_config()
            .map_err(|e| ClientError::Config(format!("invalid Google settings: {}", e)))?
            .validate()?;
        notes.push(format!(
            "Google credential file: {}",
            google.credentials_path().display()
        ));
    }

    if config.local.enabled {
        let bridge = config.local.to_bridge_config();
        let state = if bridge.binary_path.is_file() {
            "found"
        } else {
            "missing"
        };
        notes.push(format!(
            "Local bridge: {} ({})",
            bridge.binary_path.display(),
            state
        ));
    }

    Ok(notes)
}

/// Show the configuration file path.
pub fn path(config_path: &Path) -> ClientResult<()> {
    println!("config: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DisplaySettings, LocalSettings};

    #[test]
    fn zero_days_is_invalid() {
        let config = ClientConfig {
            display: DisplaySettings {
                days_to_show: 0,
                show_all_day: true,
            },
            ..Default::default()
        };
        assert!(check(&config).is_err());
    }

    #[test]
    fn reports_missing_bridge() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("calendar-bridge");
        let config = ClientConfig {
            local: LocalSettings {
                binary_path: Some(binary.clone()),
                ..Default::default()
            },
            ..Default::default()
        };
        let notes = check(&config).unwrap();
        assert_eq!(
            notes,
            vec![format!("Local bridge: {} (missing)", binary.display())]
        );
    }

    #[cfg(feature = "google")]
    #[test]
    fn google_section_is_checked() {
        let config: ClientConfig = toml::from_str(
            r#"
[google]
client_id = "id.apps.googleusercontent.com"
client_secret = "secret"
api_base = "not a url"

[local]
enabled = false
"#,
        )
        .unwrap();
        assert!(check(&config).is_err());

        let config: ClientConfig = toml::from_str(
            r#"
[google]
client_id = "id.apps.googleusercontent.com"
client_secret = "secret"
credentials_path = "/tmp/agenda-google.json"

[local]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(
            check(&config).unwrap(),
            vec!["Google credential file: /tmp/agenda-google.json".to_string()]
        );
    }

    #[test]
    fn default_config_dumps() {
        let tmp = tempfile::tempdir().unwrap();
        dump(&ClientConfig::default(), &tmp.path().join("config.toml")).unwrap();
    }
}
