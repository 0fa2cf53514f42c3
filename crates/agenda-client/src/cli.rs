//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// agenda - upcoming events from all your calendars
#[derive(Debug, Parser)]
#[command(name = "agenda")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "AGENDA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List upcoming events (default)
    Events(EventsArgs),

    /// List calendars
    Calendars {
        /// Only list calendars of this source
        #[arg(long, short)]
        source: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show registered sources and their status
    Sources,

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        provider: AuthProvider,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of the `events` command.
#[derive(Debug, Default, clap::Args)]
pub struct EventsArgs {
    /// Number of days to show, starting today
    #[arg(long, short)]
    pub days: Option<u32>,

    /// Hide all-day events
    #[arg(long)]
    pub no_all_day: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Authentication providers.
#[derive(Debug, Subcommand)]
pub enum AuthProvider {
    /// Authenticate with Google Calendar
    #[cfg(feature = "google")]
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to Google Cloud Console credentials JSON file
        ///
        /// This is the JSON file downloaded from the Google Cloud Console
        /// OAuth 2.0 credentials page. Alternative to providing client_id
        /// and client_secret separately.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Do not open a browser, only print the authorization URL
        #[arg(long)]
        no_browser: bool,

        /// Force re-authentication even if already authenticated
        #[arg(long, short, conflicts_with = "logout")]
        force: bool,

        /// Remove the stored credential
        #[arg(long)]
        logout: bool,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_events() {
        let cli = Cli::try_parse_from(["agenda", "events", "--days", "3", "--json"]).unwrap();
        match cli.command {
            Some(Command::Events(args)) => {
                assert_eq!(args.days, Some(3));
                assert!(args.json);
                assert!(!args.no_all_day);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn no_subcommand_defaults_to_none() {
        let cli = Cli::try_parse_from(["agenda", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(cli.command.is_none());
    }

    #[cfg(feature = "google")]
    #[test]
    fn force_conflicts_with_logout() {
        let result = Cli::try_parse_from(["agenda", "auth", "google", "--force", "--logout"]);
        assert!(result.is_err());
    }
}
