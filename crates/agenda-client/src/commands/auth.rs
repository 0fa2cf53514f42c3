//! Authentication commands.

use std::path::{Path, PathBuf};

use agenda_providers::google::{AuthorizationFlow, GoogleConfig, OAuthCredentials};
use tracing::{info, warn};

use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};
use crate::store::CredentialStore;

/// Options of `agenda auth google`.
#[derive(Debug, Default)]
pub struct GoogleAuthArgs {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub no_browser: bool,
    pub force: bool,
    pub logout: bool,
}

/// Run the Google authentication flow.
///
/// Resolves client credentials from CLI flags, a `--credentials-file`, or
/// `config.toml`, runs the loopback authorization flow and stores the
/// resulting credential.
///
/// When client credentials are provided via CLI or `--credentials-file`, they
/// are written to `config_path` so later runs can refresh the token.
pub async fn google(
    args: GoogleAuthArgs,
    config: &ClientConfig,
    config_path: &Path,
) -> ClientResult<()> {
    let settings = config.google_settings();
    let store = CredentialStore::new(settings.credentials_path());

    if args.logout {
        if store.clear()? {
            println!("Removed Google credential from {}", store.path().display());
        } else {
            println!("No Google credential stored.");
        }
        return Ok(());
    }

    let (credentials, source) = resolve_google_credentials(
        args.client_id,
        args.client_secret,
        args.credentials_file,
        config.google.as_ref(),
    )?;
    credentials
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;

    if !args.force && store.load()?.is_some() {
        persist_client_credentials(config_path, &credentials, &source);
        println!("Already authenticated with Google Calendar.");
        println!("Use --force to re-authenticate.");
        return Ok(());
    }

    let google_config = settings
        .apply(GoogleConfig::new(credentials.clone()))
        .with_open_browser(!args.no_browser);
    let flow = AuthorizationFlow::new(google_config.clone())?;

    println!("Starting Google Calendar authentication...");
    println!();
    if args.no_browser {
        println!("Open this URL in a browser to authorize access:");
    } else {
        println!("A browser window will open. If it doesn't, open this URL:");
    }
    println!();
    println!("  {}", flow.authorization_url()?);
    println!();
    println!(
        "Waiting for the redirect on {} (up to {} seconds)...",
        google_config.redirect_uri(),
        google_config.auth_timeout.as_secs()
    );

    let credential = flow.run().await?;
    store.save(&credential)?;
    persist_client_credentials(config_path, &credentials, &source);

    info!(path = %store.path().display(), "Google authentication successful");
    println!();
    println!("Authentication successful!");
    println!("Credential saved to {}", store.path().display());
    Ok(())
}

/// Where the client credentials were resolved from.
#[derive(Debug, PartialEq)]
enum CredentialSource {
    /// From CLI flags (--client-id/--client-secret or --credentials-file)
    Cli,
    /// From config.toml (already persisted)
    Config,
}

fn persist_client_credentials(
    config_path: &Path,
    credentials: &OAuthCredentials,
    source: &CredentialSource,
) {
    if *source == CredentialSource::Config {
        return;
    }
    match save_credentials_to_config(config_path, credentials) {
        Ok(()) => println!("Client credentials saved to {}", config_path.display()),
        Err(e) => warn!(
            path = %config_path.display(),
            error = %e,
            "could not save client credentials"
        ),
    }
}

/// Writes `client_id` and `client_secret` under `[google]` in `config_path`.
///
/// Other keys, tables and comments in the file are preserved.
fn save_credentials_to_config(
    config_path: &Path,
    credentials: &OAuthCredentials,
) -> ClientResult<()> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path)?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| ClientError::Config(format!("could not parse config.toml: {}", e)))?;

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let google = doc["google"]
        .as_table_mut()
        .ok_or_else(|| ClientError::Config("[google] in config.toml is not a table".to_string()))?;
    google["client_id"] = toml_edit::value(credentials.client_id.as_str());
    google["client_secret"] = toml_edit::value(credentials.client_secret.as_str());

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, doc.to_string())?;
    info!(path = %config_path.display(), "saved Google client credentials");
    Ok(())
}

/// Resolves Google client credentials from multiple sources.
///
/// Priority (highest to lowest):
/// 1. CLI `--client-id` + `--client-secret`
/// 2. CLI `--credentials-file` (Google Cloud Console JSON)
/// 3. `config.toml` `[google]` section
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config_google: Option<&GoogleSettings>,
) -> ClientResult<(OAuthCredentials, CredentialSource)> {
    if let (Some(id), Some(secret)) = (&cli_client_id, &cli_client_secret) {
        return Ok((OAuthCredentials::new(id, secret), CredentialSource::Cli));
    }

    if let Some(ref path) = cli_credentials_file {
        let creds = OAuthCredentials::from_file(path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok((creds, CredentialSource::Cli));
    }

    if let Some(google) = config_google
        && google.client_id.is_some()
        && google.client_secret.is_some()
    {
        let creds = google.resolve_credentials().map_err(ClientError::Config)?;
        return Ok((creds, CredentialSource::Config));
    }

    if cli_client_id.is_some() || cli_client_secret.is_some() {
        return Err(ClientError::Config(
            "both --client-id and --client-secret are required when providing credentials directly"
                .to_string(),
        ));
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file flag (path to Google Cloud Console JSON)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET env vars",
        ClientConfig::default_path().display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_providers::google::OAuthCredential;
    use chrono::{DateTime, Duration, Utc};

    #[test]
    fn resolve_credentials_from_cli() {
        let (creds, source) = resolve_google_credentials(
            Some("cli-id.apps.googleusercontent.com".to_string()),
            Some("cli-secret".to_string()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(creds.client_id, "cli-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "cli-secret");
        assert_eq!(source, CredentialSource::Cli);
    }

    #[test]
    fn resolve_credentials_cli_overrides_config() {
        let settings = GoogleSettings {
            client_id: Some("config-id.apps.googleusercontent.com".to_string()),
            client_secret: Some("config-secret".to_string()),
            ..Default::default()
        };
        let (creds, source) =
            resolve_google_credentials(None, None, None, Some(&settings)).unwrap();
        assert_eq!(creds.client_id, "config-id.apps.googleusercontent.com");
        assert_eq!(source, CredentialSource::Config);

        let (creds, source) = resolve_google_credentials(
            Some("cli-id.apps.googleusercontent.com".to_string()),
            Some("cli-secret".to_string()),
            None,
            Some(&settings),
        )
        .unwrap();
        assert_eq!(creds.client_id, "cli-id.apps.googleusercontent.com");
        assert_eq!(source, CredentialSource::Cli);
    }

    #[test]
    fn resolve_credentials_partial_or_missing_fails() {
        let result = resolve_google_credentials(
            Some("id.apps.googleusercontent.com".to_string()),
            None,
            None,
            None,
        );
        assert!(result.unwrap_err().to_string().contains("both --client-id"));

        let result = resolve_google_credentials(None, None, None, None);
        assert!(result.unwrap_err().to_string().contains("credentials are required"));
    }

    #[test]
    fn resolve_credentials_from_cli_credentials_file() {
        let tmp = tempfile::tempdir().unwrap();
        let creds_path = tmp.path().join("creds.json");
        std::fs::write(
            &creds_path,
            r#"{
                "installed": {
                    "client_id": "file-id.apps.googleusercontent.com",
                    "client_secret": "file-secret"
                }
            }"#,
        )
        .unwrap();

        let (creds, source) =
            resolve_google_credentials(None, None, Some(creds_path), None).unwrap();
        assert_eq!(creds.client_id, "file-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "file-secret");
        assert_eq!(source, CredentialSource::Cli);
    }

    #[test]
    fn save_credentials_preserves_existing_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "# my settings\n[display]\ndays_to_show = 3\n\n[google]\nselected_calendars = [\"primary\"]\n",
        )
        .unwrap();

        save_credentials_to_config(
            &config_path,
            &OAuthCredentials::new("test.apps.googleusercontent.com", "test-secret"),
        )
        .unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.starts_with("# my settings\n"));
        let reloaded: ClientConfig = toml::from_str(&content).unwrap();
        let google = reloaded.google_settings();
        assert_eq!(google.client_id.as_deref(), Some("test.apps.googleusercontent.com"));
        assert_eq!(google.client_secret.as_deref(), Some("test-secret"));
        assert_eq!(google.selected_calendars, vec!["primary"]);
        assert_eq!(reloaded.display.days_to_show, 3);
    }

    #[test]
    fn save_credentials_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("agenda").join("config.toml");

        save_credentials_to_config(&config_path, &OAuthCredentials::new("id", "secret")).unwrap();

        let reloaded = ClientConfig::load_from(&config_path).unwrap();
        assert_eq!(reloaded.google_settings().client_id.as_deref(), Some("id"));
    }

    fn config_with_store(tmp: &Path) -> ClientConfig {
        ClientConfig {
            google: Some(GoogleSettings {
                client_id: Some("id.apps.googleusercontent.com".to_string()),
                client_secret: Some("secret".to_string()),
                credentials_path: Some(tmp.join("google.json")),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Expiry is whole milliseconds, as the store persists it.
    fn stored_credential() -> OAuthCredential {
        let expires_at = Utc::now() + Duration::hours(1);
        OAuthCredential {
            access_token: "ya29.stored".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: DateTime::from_timestamp_millis(expires_at.timestamp_millis()).unwrap(),
            token_type: "Bearer".to_string(),
            scope: String::new(),
        }
    }

    #[tokio::test]
    async fn logout_removes_stored_credential() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_store(tmp.path());
        let store = CredentialStore::new(tmp.path().join("google.json"));
        store.save(&stored_credential()).unwrap();

        let args = GoogleAuthArgs {
            logout: true,
            ..Default::default()
        };
        google(args, &config, &tmp.path().join("config.toml"))
            .await
            .unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn existing_credential_skips_flow_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_store(tmp.path());
        let store = CredentialStore::new(tmp.path().join("google.json"));
        let credential = stored_credential();
        store.save(&credential).unwrap();

        google(GoogleAuthArgs::default(), &config, &tmp.path().join("config.toml"))
            .await
            .unwrap();
        assert_eq!(store.load().unwrap(), Some(credential));
        assert!(!tmp.path().join("config.toml").exists());
    }
}
