//! Lock controller configuration.

use std::path::{Path, PathBuf};

use lockbox_crypto::FileKeyStore;
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Suffix of staged bodies written beside each target file.
pub const DEFAULT_STAGING_SUFFIX: &str = ".lockbox-staged";

/// Configuration for a [`LockController`](crate::LockController).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Location of the identity key file.
    pub key_path: PathBuf,

    /// Optional session journal; without it an interrupted batch cannot be resumed.
    pub journal_path: Option<PathBuf>,

    /// Suffix for staged file bodies.
    pub staging_suffix: String,

    /// Add one lock layer after every denied unlock attempt.
    pub escalate_on_denial: bool,

    /// Transform resources of a batch in parallel.
    pub parallel: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_path: FileKeyStore::default_path(),
            journal_path: None,
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
            escalate_on_denial: true,
            parallel: true,
        }
    }
}

impl LockConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> VaultResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path).map_err(|e| VaultError::Config(e.to_string()))?;
        let config: Self =
            serde_json::from_str(&json).map_err(|e| VaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.staging_suffix.is_empty() {
            return Err(VaultError::Config("staging_suffix must not be empty".to_string()));
        }
        if self.staging_suffix.contains(['/', '\\']) {
            return Err(VaultError::Config(
                "staging_suffix must not contain path separators".to_string(),
            ));
        }
        Ok(())
    }
}
