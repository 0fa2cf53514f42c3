//! agenda CLI entry point.

use std::process::ExitCode;

use agenda_core::{TracingConfig, init_tracing};
use clap::Parser;
use tracing::Level;

use agenda_client::cli::{AuthProvider, Cli, Command, ConfigAction, EventsArgs};
use agenda_client::commands;
use agenda_client::config::ClientConfig;
use agenda_client::error::{ClientError, ClientResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default().with_level(Level::WARN)
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if cli.config.is_some() {
        ClientConfig::load_from(&config_path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().map_err(ClientError::Config)?
    };

    match cli.command {
        None => commands::events::run(&config, EventsArgs::default()).await,
        Some(Command::Events(args)) => commands::events::run(&config, args).await,
        Some(Command::Calendars { source, json }) => {
            commands::calendars::run(&config, source, json).await
        }
        Some(Command::Sources) => commands::sources::run(&config).await,
        Some(Command::Auth { provider }) => match provider {
            #[cfg(feature = "google")]
            AuthProvider::Google {
                client_id,
                client_secret,
                credentials_file,
                no_browser,
                force,
                logout,
            } => {
                let args = commands::auth::GoogleAuthArgs {
                    client_id,
                    client_secret,
                    credentials_file,
                    no_browser,
                    force,
                    logout,
                };
                commands::auth::google(args, &config, &config_path).await
            }
        },
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
