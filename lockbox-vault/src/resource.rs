//! Target resources and the stores that hold their bodies.
//!
//! Writes are two-step: `stage` places a candidate body beside the live
//! one and `commit` swaps it in atomically. A batch that fails before
//! commit leaves every live body untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Identity of a target resource (for files, the path).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&Path> for ResourceId {
    fn from(p: &Path) -> Self {
        Self(p.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for ResourceId {
    fn from(p: PathBuf) -> Self {
        Self::from(p.as_path())
    }
}

/// Storage for resource bodies with staged, atomic replacement.
///
/// Implementations must be safe to call from several threads for distinct
/// resources at once.
pub trait ResourceStore: Send + Sync {
    /// Reads the live body.
    fn read(&self, id: &ResourceId) -> VaultResult<Vec<u8>>;

    /// Writes `body` as the staged replacement, overwriting any earlier stage.
    fn stage(&self, id: &ResourceId, body: &[u8]) -> VaultResult<()>;

    /// Replaces the live body with the staged one.
    fn commit(&self, id: &ResourceId) -> VaultResult<()>;

    /// Drops a staged body. A missing stage is not an error.
    fn discard(&self, id: &ResourceId) -> VaultResult<()>;

    /// Whether a staged body exists.
    fn has_staged(&self, id: &ResourceId) -> bool;
}

// ============================================================================
// FileStore
// ============================================================================

/// Filesystem store. The resource id is the file path; staged bodies live
/// at `<path><suffix>` and are committed with `rename`.
#[derive(Debug, Clone)]
pub struct FileStore {
    staging_suffix: String,
}

impl FileStore {
    pub fn new(staging_suffix: impl Into<String>) -> Self {
        Self {
            staging_suffix: staging_suffix.into(),
        }
    }

    /// The file a resource's body lives in. Symlinks are followed so a
    /// commit replaces the link target, not the link.
    fn live_path(id: &ResourceId) -> PathBuf {
        let path = PathBuf::from(id.as_str());
        std::fs::canonicalize(&path).unwrap_or(path)
    }

    fn staged_path(&self, id: &ResourceId) -> PathBuf {
        let mut path = Self::live_path(id).into_os_string();
        path.push(&self.staging_suffix);
        PathBuf::from(path)
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_STAGING_SUFFIX)
    }
}

impl ResourceStore for FileStore {
    fn read(&self, id: &ResourceId) -> VaultResult<Vec<u8>> {
        std::fs::read(Self::live_path(id)).map_err(|e| VaultError::io(id, e))
    }

    fn stage(&self, id: &ResourceId, body: &[u8]) -> VaultResult<()> {
        use std::io::Write;

        let live = std::fs::metadata(Self::live_path(id)).map_err(|e| VaultError::io(id, e))?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(self.staged_path(id))
            .map_err(|e| VaultError::io(id, e))?;
        // The committed body replaces the target, so it takes the target's mode.
        file.set_permissions(live.permissions())
            .and_then(|()| file.write_all(body))
            .and_then(|()| file.sync_all())
            .map_err(|e| VaultError::io(id, e))
    }

    fn commit(&self, id: &ResourceId) -> VaultResult<()> {
        std::fs::rename(self.staged_path(id), Self::live_path(id)).map_err(|e| VaultError::io(id, e))
    }

    fn discard(&self, id: &ResourceId) -> VaultResult<()> {
        match std::fs::remove_file(self.staged_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::io(id, e)),
        }
    }

    fn has_staged(&self, id: &ResourceId) -> bool {
        self.staged_path(id).exists()
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
struct Slot {
    live: Option<Vec<u8>>,
    staged: Option<Vec<u8>>,
}

/// In-process store with the same staging contract as [`FileStore`].
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<BTreeMap<ResourceId, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a live body.
    pub fn insert(&self, id: impl Into<ResourceId>, body: impl Into<Vec<u8>>) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.entry(id.into()).or_default().live = Some(body.into());
    }

    /// Returns a copy of the live body, if present.
    pub fn get(&self, id: &ResourceId) -> Option<Vec<u8>> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.get(id).and_then(|s| s.live.clone())
    }

    /// Ids of every resource with a live body, in order.
    pub fn ids(&self) -> Vec<ResourceId> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .iter()
            .filter(|(_, s)| s.live.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl ResourceStore for MemoryStore {
    fn read(&self, id: &ResourceId) -> VaultResult<Vec<u8>> {
        self.get(id).ok_or_else(|| VaultError::io(id, "not found"))
    }

    fn stage(&self, id: &ResourceId, body: &[u8]) -> VaultResult<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.entry(id.clone()).or_default().staged = Some(body.to_vec());
        Ok(())
    }

    fn commit(&self, id: &ResourceId) -> VaultResult<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| VaultError::io(id, "not found"))?;
        let staged = slot
            .staged
            .take()
            .ok_or_else(|| VaultError::io(id, "nothing staged"))?;
        slot.live = Some(staged);
        Ok(())
    }

    fn discard(&self, id: &ResourceId) -> VaultResult<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = slots.get_mut(id) {
            slot.staged = None;
        }
        Ok(())
    }

    fn has_staged(&self, id: &ResourceId) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.get(id).is_some_and(|s| s.staged.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_path_appends_suffix() {
        let store = FileStore::new(".tmp");
        let id = ResourceId::new("/data/report.txt");
        assert_eq!(store.staged_path(&id), PathBuf::from("/data/report.txt.tmp"));
    }

    #[test]
    fn memory_commit_without_stage_fails() {
        let store = MemoryStore::new();
        store.insert("a", "body");
        assert!(store.commit(&ResourceId::new("a")).is_err());
        assert_eq!(store.get(&ResourceId::new("a")).unwrap(), b"body");
    }
}
