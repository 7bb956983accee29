//! Session journal.
//!
//! Records the committed lock depth and any in-flight batch so a session
//! interrupted mid-batch can be rolled back or forward deterministically.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::resource::ResourceId;

const JOURNAL_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Lock,
    Unlock,
}

/// How far a batch got before the journal was last written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    /// Staged bodies may be incomplete; live bodies are untouched.
    Staging,
    /// Every staged body is complete; some may already be live.
    Committing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBatch {
    pub kind: BatchKind,
    pub from_depth: u32,
    pub to_depth: u32,
    pub phase: BatchPhase,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub version: u32,
    pub resources: Vec<ResourceId>,
    pub depth: u32,
    pub pending: Option<PendingBatch>,
}

impl JournalRecord {
    pub fn new(resources: Vec<ResourceId>, depth: u32) -> Self {
        Self {
            version: JOURNAL_VERSION,
            resources,
            depth,
            pending: None,
        }
    }
}

/// JSON journal file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct SessionJournal {
    path: PathBuf,
}

impl SessionJournal {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> VaultResult<Option<JournalRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| VaultError::Journal(e.to_string()))?;
        let record: JournalRecord =
            serde_json::from_str(&json).map_err(|e| VaultError::Journal(e.to_string()))?;
        if record.version != JOURNAL_VERSION {
            return Err(VaultError::Journal(format!(
                "unsupported journal version {}",
                record.version
            )));
        }
        Ok(Some(record))
    }

    pub fn save(&self, record: &JournalRecord) -> VaultResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| VaultError::Journal(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| VaultError::Journal(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| VaultError::Journal(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| VaultError::Journal(e.to_string()))
    }

    pub fn clear(&self) -> VaultResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| VaultError::Journal(e.to_string()))?;
        }
        Ok(())
    }
}
