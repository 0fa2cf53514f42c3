//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/agenda/config.toml` by default:
//!
//! ```toml
//! [display]
//! days_to_show = 7
//! show_all_day = true
//!
//! [google]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "..."
//! selected_calendars = ["primary"]
//!
//! [local]
//! enabled = true
//! selected_calendars = []
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use agenda_providers::bridge::BridgeConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the agenda client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Display settings.
    pub display: DisplaySettings,

    /// Google Calendar settings.
    #[cfg(feature = "google")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleSettings>,

    /// Local calendar (bridge) settings.
    pub local: LocalSettings,
}

/// Display settings for output formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Number of days shown, starting today.
    pub days_to_show: u32,

    /// Include all-day events.
    pub show_all_day: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            days_to_show: 7,
            show_all_day: true,
        }
    }
}

/// Local calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Register the local source.
    pub enabled: bool,

    /// Explicit path to the bridge binary, skipping discovery.
    pub binary_path: Option<PathBuf>,

    /// Directory searched for the bridge. Defaults to the executable's directory.
    pub install_dir: Option<PathBuf>,

    /// Platform the bridge runs on (`std::env::consts::OS` value).
    pub required_os: Option<String>,

    /// Calendar IDs to show. Empty means all.
    pub selected_calendars: Vec<String>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            binary_path: None,
            install_dir: None,
            required_os: None,
            selected_calendars: Vec::new(),
        }
    }
}

impl LocalSettings {
    /// Builds the bridge configuration, discovering the binary if no path is set.
    pub fn to_bridge_config(&self) -> BridgeConfig {
        let config = match self.binary_path {
            Some(ref path) => BridgeConfig::new(path),
            None => {
                let install_dir = self
                    .install_dir
                    .clone()
                    .or_else(executable_dir)
                    .unwrap_or_else(|| PathBuf::from("."));
                BridgeConfig::discover(install_dir)
            }
        };
        match self.required_os {
            Some(ref os) => config.with_required_os(os),
            None => config,
        }
    }
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda")
    }
}

// ---------------------------------------------------------------------------
// GoogleSettings (in config.toml, including credentials)
// ---------------------------------------------------------------------------

/// Google Calendar settings.
#[cfg(feature = "google")]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID.
    pub client_id: Option<String>,

    /// OAuth client secret.
    pub client_secret: Option<String>,

    /// Label shown next to this account's calendars.
    pub account_name: Option<String>,

    /// Where the OAuth credential is persisted.
    pub credentials_path: Option<PathBuf>,

    /// Calendar IDs to show. Empty means all.
    pub selected_calendars: Vec<String>,

    /// Overrides the authorization endpoint.
    pub auth_url: Option<String>,

    /// Overrides the token endpoint.
    pub token_url: Option<String>,

    /// Overrides the Calendar API base URL.
    pub api_base: Option<String>,

    /// Loopback port for the authorization redirect.
    pub redirect_port: Option<u16>,

    /// HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
}

#[cfg(feature = "google")]
impl GoogleSettings {
    /// Converts to provider configuration.
    pub fn to_provider_config(&self) -> Result<agenda_providers::google::GoogleConfig, String> {
        let credentials = self.resolve_credentials()?;
        credentials.validate().map_err(|e| e.to_string())?;
        Ok(self.apply(agenda_providers::google::GoogleConfig::new(credentials)))
    }

    /// Applies the endpoint and timeout overrides to `config`.
    pub fn apply(
        &self,
        mut config: agenda_providers::google::GoogleConfig,
    ) -> agenda_providers::google::GoogleConfig {
        if let Some(ref name) = self.account_name {
            config = config.with_account_name(name);
        }
        if let Some(ref url) = self.auth_url {
            config = config.with_auth_url(url);
        }
        if let Some(ref url) = self.token_url {
            config = config.with_token_url(url);
        }
        if let Some(ref url) = self.api_base {
            config = config.with_api_base(url);
        }
        if let Some(port) = self.redirect_port {
            config = config.with_redirect_port(port);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    /// Returns the credential file path, defaulting to the data directory.
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| ClientConfig::default_data_dir().join("google-credential.json"))
    }

    /// Reads the OAuth client credentials from the inline fields.
    pub(crate) fn resolve_credentials(
        &self,
    ) -> Result<agenda_providers::google::OAuthCredentials, String> {
        use agenda_providers::google::OAuthCredentials;

        let client_id = self.client_id.as_deref().ok_or_else(|| {
            format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 Or run: agenda auth google --credentials-file <path>",
                ClientConfig::default_path().display()
            )
        })?;

        let client_secret = self.client_secret.as_deref().ok_or_else(|| {
            "client_secret is missing from [google] section in config.toml".to_string()
        })?;

        Ok(OAuthCredentials::new(client_id, client_secret))
    }
}

#[cfg(feature = "google")]
impl ClientConfig {
    /// Returns the `[google]` settings, or the defaults when the section is absent.
    pub fn google_settings(&self) -> GoogleSettings {
        self.google.clone().unwrap_or_default()
    }
}
