//! Credential-gated lock controller.
//!
//! Every lock batch wraps each target resource in one more envelope layer.
//! Unlocking requires an accepted credential and peels exactly as many
//! layers as were applied, outermost first. A denied attempt adds a layer.
//!
//! Batches are two-phase: all resources are transformed and staged first,
//! then committed. The lock depth only moves once a whole batch is live,
//! so every resource always carries the same number of layers.

use std::sync::Arc;

use lockbox_crypto::{CryptoError, EncryptedBundle, FileKeyStore, KeyPair, KeyProvider};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::auth::Authenticator;
use crate::config::LockConfig;
use crate::credential::{Credential, CredentialPrompt};
use crate::error::{VaultError, VaultResult};
use crate::journal::{BatchKind, BatchPhase, JournalRecord, PendingBatch, SessionJournal};
use crate::resource::{FileStore, ResourceId, ResourceStore};

/// Observable lock state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { depth: u32 },
}

/// Result of one unlock attempt.
#[derive(Debug)]
pub enum UnlockOutcome {
    /// Every layer was reversed; resources hold their original bytes.
    Unlocked,
    /// The credential was refused. `depth` is the lock depth now on disk.
    Denied { depth: u32 },
    /// A layer failed to open. Nothing past `depth_remaining` was reversed.
    CorruptedState {
        depth_remaining: u32,
        resource: ResourceId,
        cause: CryptoError,
    },
}

/// Short summary of the last attempt, kept on the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptResult {
    Unlocked,
    Denied,
    Corrupted,
}

/// Batch of resources and its current lock depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockSession {
    resources: Vec<ResourceId>,
    depth: u32,
    last_attempt: Option<AttemptResult>,
}

impl LockSession {
    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn last_attempt(&self) -> Option<AttemptResult> {
        self.last_attempt
    }

    pub fn state(&self) -> LockState {
        match self.depth {
            0 => LockState::Unlocked,
            depth => LockState::Locked { depth },
        }
    }
}

/// Orchestrates the envelope codec over a batch of resources.
pub struct LockController {
    keys: Arc<dyn KeyProvider>,
    store: Arc<dyn ResourceStore>,
    authenticator: Arc<dyn Authenticator>,
    journal: Option<SessionJournal>,
    escalate_on_denial: bool,
    parallel: bool,
    session: LockSession,
    pending: Option<PendingBatch>,
}

impl LockController {
    /// Creates an unlocked session over `resources`. Duplicate ids are dropped.
    pub fn new(
        resources: Vec<ResourceId>,
        keys: Arc<dyn KeyProvider>,
        store: Arc<dyn ResourceStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            keys,
            store,
            authenticator,
            journal: None,
            escalate_on_denial: true,
            parallel: true,
            session: LockSession {
                resources: dedup(resources),
                depth: 0,
                last_attempt: None,
            },
            pending: None,
        }
    }

    /// Records progress in `journal` so an interrupted batch can be resumed.
    pub fn with_journal(mut self, journal: SessionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn escalate_on_denial(mut self, escalate: bool) -> Self {
        self.escalate_on_denial = escalate;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builds a file-backed controller for a fresh session.
    ///
    /// Refuses to start over an unfinished journaled session; use
    /// [`LockController::resume`] for that.
    pub fn from_config(
        config: &LockConfig,
        resources: Vec<ResourceId>,
        authenticator: Arc<dyn Authenticator>,
    ) -> VaultResult<Self> {
        config.validate()?;
        let journal = match &config.journal_path {
            Some(path) => {
                let journal = SessionJournal::new(path);
                if let Some(record) = journal.load()? {
                    if record.depth > 0 || record.pending.is_some() {
                        return Err(VaultError::Journal(format!(
                            "unfinished session at depth {} in {}",
                            record.depth,
                            path.display()
                        )));
                    }
                }
                Some(journal)
            }
            None => None,
        };

        let keys = FileKeyStore::load_or_create(&config.key_path)?;
        let store = FileStore::new(config.staging_suffix.clone());

        let mut controller = Self::new(resources, Arc::new(keys), Arc::new(store), authenticator)
            .escalate_on_denial(config.escalate_on_denial)
            .parallel(config.parallel);
        if let Some(journal) = journal {
            controller = controller.with_journal(journal);
        }
        Ok(controller)
    }

    /// Rebuilds a session from its journal and finishes any interrupted batch.
    ///
    /// The identity key must already exist; a missing key file is an error
    /// rather than a reason to generate a new one.
    pub fn resume(config: &LockConfig, authenticator: Arc<dyn Authenticator>) -> VaultResult<Self> {
        config.validate()?;
        let path = config
            .journal_path
            .as_ref()
            .ok_or_else(|| VaultError::Config("resume requires journal_path".to_string()))?;
        let journal = SessionJournal::new(path);
        let record = journal
            .load()?
            .ok_or_else(|| VaultError::Journal(format!("no session in {}", path.display())))?;

        let keys = FileKeyStore::open(&config.key_path)?;
        let store = FileStore::new(config.staging_suffix.clone());
        Self::from_record(record, Arc::new(keys), Arc::new(store), authenticator)?
            .escalate_on_denial(config.escalate_on_denial)
            .parallel(config.parallel)
            .with_journal(journal)
            .recovered()
    }

    /// Rebuilds a session from a journal record without touching storage.
    pub fn from_record(
        record: JournalRecord,
        keys: Arc<dyn KeyProvider>,
        store: Arc<dyn ResourceStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> VaultResult<Self> {
        let mut controller = Self::new(record.resources, keys, store, authenticator);
        controller.session.depth = record.depth;
        controller.pending = record.pending;
        info!(
            "restored session over {} resources at depth {}",
            controller.session.resources.len(),
            record.depth
        );
        Ok(controller)
    }

    fn recovered(mut self) -> VaultResult<Self> {
        if self.pending.is_some() {
            self.recover()?;
        }
        Ok(self)
    }

    pub fn session(&self) -> &LockSession {
        &self.session
    }

    pub fn depth(&self) -> u32 {
        self.session.depth
    }

    pub fn state(&self) -> LockState {
        self.session.state()
    }

    /// Whether a batch is stuck between staging and commit.
    pub fn needs_recovery(&self) -> bool {
        self.pending.is_some()
    }

    /// Wraps every resource in one more layer. Returns the new depth.
    ///
    /// Either all resources advance one layer or none do.
    pub fn lock(&mut self) -> VaultResult<u32> {
        self.ensure_ready()?;
        if self.session.resources.is_empty() {
            return Err(VaultError::EmptyBatch);
        }
        self.run_batch(BatchKind::Lock)?;
        info!(
            "locked {} resources, depth now {}",
            self.session.resources.len(),
            self.session.depth
        );
        Ok(self.session.depth)
    }

    /// Verifies `credential` and either fully unlocks or escalates.
    ///
    /// Authenticator errors count as denials. Corruption is reported as an
    /// outcome, not retried.
    pub fn attempt_unlock(&mut self, credential: &Credential) -> VaultResult<UnlockOutcome> {
        self.ensure_ready()?;
        if self.session.depth == 0 {
            return Err(VaultError::NotLocked);
        }

        let accepted = match self.authenticator.verify(credential) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("authenticator failed, treating attempt as denied: {e}");
                false
            }
        };

        if !accepted {
            self.session.last_attempt = Some(AttemptResult::Denied);
            return Ok(self.deny());
        }

        let outcome = self.reverse_all()?;
        self.session.last_attempt = Some(match outcome {
            UnlockOutcome::Unlocked => AttemptResult::Unlocked,
            UnlockOutcome::Denied { .. } => AttemptResult::Denied,
            UnlockOutcome::CorruptedState { .. } => AttemptResult::Corrupted,
        });
        Ok(outcome)
    }

    /// Reads one line from `prompt` and runs [`attempt_unlock`](Self::attempt_unlock).
    ///
    /// A prompt failure leaves the session untouched.
    pub fn prompt_and_unlock(&mut self, prompt: &dyn CredentialPrompt) -> VaultResult<UnlockOutcome> {
        let line = Zeroizing::new(prompt.read_line().map_err(|e| VaultError::Prompt(e.to_string()))?);
        let credential = Credential::from_prompt_line(&line);
        self.attempt_unlock(&credential)
    }

    /// Finishes a batch interrupted between staging and commit.
    ///
    /// A batch still staging is rolled back; a batch already committing is
    /// rolled forward. Returns the resulting depth.
    pub fn recover(&mut self) -> VaultResult<u32> {
        let Some(pending) = self.pending else {
            return Ok(self.session.depth);
        };

        match pending.phase {
            BatchPhase::Staging => {
                info!("rolling back {:?} batch at depth {}", pending.kind, pending.from_depth);
                for id in &self.session.resources {
                    self.store.discard(id)?;
                }
                self.session.depth = pending.from_depth;
            }
            BatchPhase::Committing => {
                info!(
                    "rolling forward {:?} batch to depth {}",
                    pending.kind, pending.to_depth
                );
                for id in &self.session.resources {
                    if self.store.has_staged(id) {
                        self.store.commit(id)?;
                    }
                }
                self.session.depth = pending.to_depth;
            }
        }

        self.pending = None;
        self.sync_journal()?;
        Ok(self.session.depth)
    }

    fn ensure_ready(&self) -> VaultResult<()> {
        if self.pending.is_some() {
            return Err(VaultError::PendingCommit);
        }
        Ok(())
    }

    fn deny(&mut self) -> UnlockOutcome {
        if self.escalate_on_denial {
            match self.lock() {
                Ok(depth) => warn!("unlock denied, escalated to depth {depth}"),
                Err(e) => error!("unlock denied, escalation failed: {e}"),
            }
        } else {
            warn!("unlock denied at depth {}", self.session.depth);
        }
        UnlockOutcome::Denied {
            depth: self.session.depth,
        }
    }

    fn reverse_all(&mut self) -> VaultResult<UnlockOutcome> {
        let layers = self.session.depth;
        debug!("credential accepted, reversing {layers} layers");

        while self.session.depth > 0 {
            match self.run_batch(BatchKind::Unlock) {
                Ok(()) => {}
                Err(VaultError::ResourceCrypto { resource, source }) => {
                    error!(
                        "layer {} of {resource} failed to open: {source}",
                        self.session.depth
                    );
                    return Ok(UnlockOutcome::CorruptedState {
                        depth_remaining: self.session.depth,
                        resource,
                        cause: source,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "unlocked {} resources after reversing {layers} layers",
            self.session.resources.len()
        );
        Ok(UnlockOutcome::Unlocked)
    }

    fn run_batch(&mut self, kind: BatchKind) -> VaultResult<()> {
        let from_depth = self.session.depth;
        let to_depth = match kind {
            BatchKind::Lock => from_depth.checked_add(1).ok_or(VaultError::DepthLimit)?,
            BatchKind::Unlock => from_depth.checked_sub(1).ok_or(VaultError::NotLocked)?,
        };
        let mut batch = PendingBatch {
            kind,
            from_depth,
            to_depth,
            phase: BatchPhase::Staging,
        };

        self.write_journal(Some(batch))?;

        let staged = self
            .stage_all(kind, from_depth)
            .and_then(|()| {
                batch.phase = BatchPhase::Committing;
                self.write_journal(Some(batch))
            });
        if let Err(e) = staged {
            self.discard_all();
            if let Err(je) = self.write_journal(None) {
                warn!("failed to clear pending batch from journal: {je}");
            }
            return Err(e);
        }

        self.pending = Some(batch);
        for id in &self.session.resources {
            if let Err(e) = self.store.commit(id) {
                error!("commit of {id} failed, batch left pending: {e}");
                return Err(e);
            }
        }
        self.pending = None;
        self.session.depth = to_depth;
        debug!("{kind:?} batch committed, depth {from_depth} -> {to_depth}");

        self.sync_journal()
    }

    fn stage_all(&self, kind: BatchKind, depth: u32) -> VaultResult<()> {
        let keypair = self.keys.keypair();
        let store = self.store.as_ref();
        let stage = |id: &ResourceId| stage_one(store, keypair, kind, depth, id);

        if self.parallel {
            self.session.resources.par_iter().try_for_each(stage)
        } else {
            self.session.resources.iter().try_for_each(stage)
        }
    }

    fn discard_all(&self) {
        for id in &self.session.resources {
            if let Err(e) = self.store.discard(id) {
                warn!("failed to discard staged body of {id}: {e}");
            }
        }
    }

    fn write_journal(&self, pending: Option<PendingBatch>) -> VaultResult<()> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        let mut record = JournalRecord::new(self.session.resources.clone(), self.session.depth);
        record.pending = pending;
        journal.save(&record)
    }

    /// Persists committed state; drops the journal once fully unlocked.
    fn sync_journal(&self) -> VaultResult<()> {
        match &self.journal {
            Some(journal) if self.session.depth == 0 && self.pending.is_none() => journal.clear(),
            Some(_) => self.write_journal(self.pending),
            None => Ok(()),
        }
    }
}

/// Reads, transforms and stages one resource for the layer at `depth`.
fn stage_one(
    store: &dyn ResourceStore,
    keypair: &KeyPair,
    kind: BatchKind,
    depth: u32,
    id: &ResourceId,
) -> VaultResult<()> {
    let body = Zeroizing::new(store.read(id)?);

    let next = match kind {
        BatchKind::Lock => Zeroizing::new(
            lockbox_crypto::lock_bytes(&body, &keypair.public).map_err(|source| {
                VaultError::ResourceCrypto {
                    resource: id.clone(),
                    source,
                }
            })?,
        ),
        BatchKind::Unlock => {
            let bundle = EncryptedBundle::from_bytes(&body).map_err(|_| VaultError::DepthDiverged {
                resource: id.clone(),
                expected: depth,
            })?;
            Zeroizing::new(lockbox_crypto::unlock(&bundle, &keypair.secret).map_err(|source| {
                VaultError::ResourceCrypto {
                    resource: id.clone(),
                    source,
                }
            })?)
        }
    };

    store.stage(id, &next)?;
    debug!("staged {kind:?} layer for {id}");
    Ok(())
}

fn dedup(resources: Vec<ResourceId>) -> Vec<ResourceId> {
    let mut seen = std::collections::HashSet::new();
    let total = resources.len();
    let unique: Vec<ResourceId> = resources
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect();
    if unique.len() != total {
        warn!("dropped {} duplicate resource ids", total - unique.len());
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let ids = vec!["b".into(), "a".into(), "b".into(), "c".into(), "a".into()];
        let unique = dedup(ids);
        assert_eq!(unique, vec![ResourceId::new("b"), ResourceId::new("a"), ResourceId::new("c")]);
    }

    #[test]
    fn session_state_follows_depth() {
        let mut session = LockSession {
            resources: vec![],
            depth: 0,
            last_attempt: None,
        };
        assert_eq!(session.state(), LockState::Unlocked);
        session.depth = 3;
        assert_eq!(session.state(), LockState::Locked { depth: 3 });
    }
}
