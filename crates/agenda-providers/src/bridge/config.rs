//! Local bridge configuration and binary discovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

/// File name of the bridge helper.
pub const BRIDGE_BINARY_NAME: &str = "calendar-bridge";

/// Ancestors of the install directory probed during discovery.
const MAX_ANCESTOR_DEPTH: usize = 5;

/// Configuration for the local bridge source.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Path to the bridge executable.
    pub binary_path: PathBuf,
    /// `std::env::consts::OS` value the bridge runs on.
    pub required_os: String,
    /// Timeout for `events`.
    pub events_timeout: Duration,
    /// Timeout for `calendars`.
    pub calendars_timeout: Duration,
    /// Timeout for `check-auth`.
    pub auth_check_timeout: Duration,
}

impl BridgeConfig {
    /// Default platform: the bridge reads the macOS calendar store.
    pub const DEFAULT_REQUIRED_OS: &'static str = "macos";

    /// Creates a configuration for the bridge at `binary_path`.
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            required_os: Self::DEFAULT_REQUIRED_OS.to_string(),
            events_timeout: Duration::from_secs(30),
            calendars_timeout: Duration::from_secs(10),
            auth_check_timeout: Duration::from_secs(5),
        }
    }

    /// Creates a configuration by discovering the bridge near `install_dir`.
    pub fn discover(install_dir: impl AsRef<Path>) -> Self {
        Self::new(discover_binary(install_dir.as_ref()))
    }

    /// Sets the platform the bridge is available on.
    pub fn with_required_os(mut self, os: impl Into<String>) -> Self {
        self.required_os = os.into();
        self
    }

    /// Sets the `events` timeout.
    pub fn with_events_timeout(mut self, timeout: Duration) -> Self {
        self.events_timeout = timeout;
        self
    }

    /// Sets the `calendars` timeout.
    pub fn with_calendars_timeout(mut self, timeout: Duration) -> Self {
        self.calendars_timeout = timeout;
        self
    }

    /// Sets the `check-auth` timeout.
    pub fn with_auth_check_timeout(mut self, timeout: Duration) -> Self {
        self.auth_check_timeout = timeout;
        self
    }
}

/// Locates the bridge binary for an install directory.
///
/// Candidates, first existing wins:
/// 1. the install directory with symlinks resolved
/// 2. up to five of its ancestors (a symlinked install pointing into a
///    development checkout)
/// 3. the install directory as given
/// 4. the current working directory
///
/// Falls back to `<resolved install dir>/calendar-bridge`.
pub fn discover_binary(install_dir: &Path) -> PathBuf {
    let resolved = std::fs::canonicalize(install_dir).unwrap_or_else(|e| {
        debug!(dir = %install_dir.display(), error = %e, "could not resolve install dir");
        install_dir.to_path_buf()
    });

    let candidates = candidate_paths(install_dir, &resolved, std::env::current_dir().ok());
    for candidate in &candidates {
        if candidate.is_file() {
            debug!(path = %candidate.display(), "found bridge binary");
            return candidate.clone();
        }
    }

    let fallback = resolved.join(BRIDGE_BINARY_NAME);
    warn!(
        path = %fallback.display(),
        "bridge binary not found, using fallback path"
    );
    fallback
}

fn candidate_paths(install_dir: &Path, resolved: &Path, cwd: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = resolved
        .ancestors()
        .take(MAX_ANCESTOR_DEPTH + 1)
        .map(|dir| dir.join(BRIDGE_BINARY_NAME))
        .collect();
    candidates.push(install_dir.join(BRIDGE_BINARY_NAME));
    if let Some(cwd) = cwd {
        candidates.push(cwd.join(BRIDGE_BINARY_NAME));
    }
    let mut unique = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BridgeConfig::new("/opt/agenda/calendar-bridge");
        assert_eq!(config.required_os, "macos");
        assert_eq!(config.events_timeout, Duration::from_secs(30));
        assert_eq!(config.calendars_timeout, Duration::from_secs(10));
        assert_eq!(config.auth_check_timeout, Duration::from_secs(5));
    }

    #[test]
    fn candidate_order() {
        let candidates = candidate_paths(
            Path::new("/link/plugin"),
            Path::new("/dev/repo/build/plugin"),
            Some(PathBuf::from("/work")),
        );
        let expected: Vec<PathBuf> = [
            "/dev/repo/build/plugin",
            "/dev/repo/build",
            "/dev/repo",
            "/dev",
            "/",
            "/link/plugin",
            "/work",
        ]
        .iter()
        .map(|dir| Path::new(dir).join(BRIDGE_BINARY_NAME))
        .collect();
        assert_eq!(candidates, expected);
    }

    #[test]
    fn discovers_binary_in_ancestor() {
        let root = tempfile::tempdir().unwrap();
        let install = root.path().join("a").join("b");
        std::fs::create_dir_all(&install).unwrap();
        let binary = root.path().join("a").join(BRIDGE_BINARY_NAME);
        std::fs::write(&binary, "").unwrap();

        let found = discover_binary(&install);
        assert_eq!(found, std::fs::canonicalize(&binary).unwrap());
    }

    #[test]
    fn install_dir_wins_over_ancestor() {
        let root = tempfile::tempdir().unwrap();
        let install = root.path().join("plugin");
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join(BRIDGE_BINARY_NAME), "").unwrap();
        std::fs::write(root.path().join(BRIDGE_BINARY_NAME), "").unwrap();

        let config = BridgeConfig::discover(&install);
        assert_eq!(
            config.binary_path,
            std::fs::canonicalize(&install).unwrap().join(BRIDGE_BINARY_NAME)
        );
    }

    #[test]
    fn falls_back_to_resolved_dir() {
        let root = tempfile::tempdir().unwrap();
        let install = root.path().join("empty");
        std::fs::create_dir_all(&install).unwrap();

        let found = discover_binary(&install);
        assert_eq!(
            found,
            std::fs::canonicalize(&install).unwrap().join(BRIDGE_BINARY_NAME)
        );
    }
}
