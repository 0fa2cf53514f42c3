//! Builds the aggregator from `config.toml`.

use std::sync::Arc;

use agenda_providers::Aggregator;
use agenda_providers::bridge::BridgeSource;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Registration name of the local bridge source.
pub const LOCAL_SOURCE: &str = "local";

/// Registration name of the Google source.
#[cfg(feature = "google")]
pub const GOOGLE_SOURCE: &str = "google";

/// The configured sources, registered with an [`Aggregator`].
///
/// Concrete handles are kept next to the aggregator for the diagnostics
/// the [`CalendarSource`](agenda_providers::CalendarSource) trait does not
/// cover.
pub struct Registry {
    pub aggregator: Aggregator,
    pub local: Option<Arc<BridgeSource>>,
    #[cfg(feature = "google")]
    pub google: Option<Arc<agenda_providers::google::GoogleSource>>,
}

impl Registry {
    /// Registers every source enabled in `config`.
    ///
    /// A Google section without usable client credentials is skipped with a
    /// warning so the local calendars still show.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let mut aggregator = Aggregator::new();

        let local = if config.local.enabled {
            let source = Arc::new(BridgeSource::new(config.local.to_bridge_config()));
            aggregator.register_source(LOCAL_SOURCE, source.clone());
            aggregator.set_calendar_filter(
                LOCAL_SOURCE,
                config.local.selected_calendars.iter().cloned(),
            );
            Some(source)
        } else {
            debug!("local source disabled");
            None
        };

        #[cfg(feature = "google")]
        let google = google::register(&mut aggregator, config)?;

        Ok(Self {
            aggregator,
            local,
            #[cfg(feature = "google")]
            google,
        })
    }
}

#[cfg(feature = "google")]
mod google {
    use std::sync::Arc;

    use agenda_providers::Aggregator;
    use agenda_providers::google::GoogleSource;
    use tracing::{debug, warn};

    use super::GOOGLE_SOURCE;
    use crate::config::ClientConfig;
    use crate::error::ClientResult;
    use crate::store::CredentialStore;

    pub(super) fn register(
        aggregator: &mut Aggregator,
        config: &ClientConfig,
    ) -> ClientResult<Option<Arc<GoogleSource>>> {
        let Some(ref settings) = config.google else {
            return Ok(None);
        };
        let provider_config = match settings.to_provider_config() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Google source disabled");
                return Ok(None);
            }
        };

        let store = CredentialStore::new(settings.credentials_path());
        let persist = store.clone();
        let source = GoogleSource::new(provider_config)?.with_rotation_callback(move |credential| {
            if let Err(e) = persist.save(credential) {
                warn!(error = %e, "failed to persist refreshed Google credential");
            }
        });

        match store.load() {
            Ok(Some(credential)) => source.set_credential(credential),
            Ok(None) => debug!("no Google credential, run 'agenda auth google'"),
            Err(e) => warn!(error = %e, "ignoring unreadable Google credential"),
        }

        let source = Arc::new(source);
        aggregator.register_source(GOOGLE_SOURCE, source.clone());
        aggregator.set_calendar_filter(GOOGLE_SOURCE, settings.selected_calendars.iter().cloned());
        Ok(Some(source))
    }
}
