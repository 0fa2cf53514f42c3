//! On-disk storage for the Google OAuth credential.

use std::fs;
use std::path::{Path, PathBuf};

use agenda_providers::google::OAuthCredential;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};

/// JSON file holding one [`OAuthCredential`].
///
/// Writes go through a temporary file and a rename, so a crash never leaves
/// a truncated credential behind.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored credential, if any.
    pub fn load(&self) -> ClientResult<Option<OAuthCredential>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no stored credential");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ClientError::Store(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let credential = serde_json::from_str(&content).map_err(|e| {
            ClientError::Store(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), "loaded stored credential");
        Ok(Some(credential))
    }

    /// Persists `credential`, replacing any previous one.
    pub fn save(&self, credential: &OAuthCredential) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::Store(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(credential)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| {
            ClientError::Store(format!("failed to write {}: {}", temp_path.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ClientError::Store(format!("failed to restrict {}: {}", temp_path.display(), e))
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ClientError::Store(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }

    /// Deletes the stored credential. Returns false if there was none.
    pub fn clear(&self) -> ClientResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| {
            ClientError::Store(format!("failed to remove {}: {}", self.path.display(), e))
        })?;
        info!(path = %self.path.display(), "removed stored credential");
        Ok(true)
    }
}
