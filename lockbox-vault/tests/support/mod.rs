//! Shared helpers for lock controller integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lockbox_crypto::KeyPair;
use lockbox_vault::{
    AuthError, Authenticator, Credential, LockController, MemoryStore, ResourceId, ResourceStore,
    VaultError, VaultResult,
};

pub const PASSPHRASE: &str = "open sesame";

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("lockbox_vault=debug")
        .with_test_writer()
        .try_init();
}

/// Accepts exactly [`PASSPHRASE`].
pub fn passphrase_auth() -> Arc<dyn Authenticator> {
    Arc::new(|c: &Credential| Ok::<bool, AuthError>(c.expose() == PASSPHRASE))
}

/// Always fails to reach a verdict.
pub fn unreachable_auth() -> Arc<dyn Authenticator> {
    Arc::new(|_: &Credential| {
        Err::<bool, AuthError>(AuthError::Unavailable("directory offline".into()))
    })
}

pub fn good() -> Credential {
    Credential::new(PASSPHRASE)
}

pub fn bad() -> Credential {
    Credential::new("hunter2")
}

pub fn ids(names: &[&str]) -> Vec<ResourceId> {
    names.iter().map(|n| ResourceId::new(*n)).collect()
}

/// Store wrapper that counts calls and injects failures by resource id.
pub struct ProbeStore {
    inner: Arc<dyn ResourceStore>,
    stages: Mutex<HashMap<ResourceId, usize>>,
    fail_read: Mutex<Option<ResourceId>>,
    fail_stage: Mutex<Option<ResourceId>>,
    fail_commit: Mutex<Option<ResourceId>>,
}

impl ProbeStore {
    pub fn new(inner: Arc<dyn ResourceStore>) -> Self {
        Self {
            inner,
            stages: Mutex::new(HashMap::new()),
            fail_read: Mutex::new(None),
            fail_stage: Mutex::new(None),
            fail_commit: Mutex::new(None),
        }
    }

    pub fn fail_read_of(&self, id: Option<&str>) {
        *self.fail_read.lock().unwrap() = id.map(ResourceId::new);
    }

    pub fn fail_stage_of(&self, id: Option<&str>) {
        *self.fail_stage.lock().unwrap() = id.map(ResourceId::new);
    }

    pub fn fail_commit_of(&self, id: Option<&str>) {
        *self.fail_commit.lock().unwrap() = id.map(ResourceId::new);
    }

    pub fn stage_count(&self, id: &str) -> usize {
        self.stages
            .lock()
            .unwrap()
            .get(&ResourceId::new(id))
            .copied()
            .unwrap_or(0)
    }

    fn injected(slot: &Mutex<Option<ResourceId>>, id: &ResourceId, what: &str) -> VaultResult<()> {
        if slot.lock().unwrap().as_ref() == Some(id) {
            return Err(VaultError::ResourceIo {
                resource: id.clone(),
                message: format!("injected {what} failure"),
            });
        }
        Ok(())
    }
}

impl ResourceStore for ProbeStore {
    fn read(&self, id: &ResourceId) -> VaultResult<Vec<u8>> {
        Self::injected(&self.fail_read, id, "read")?;
        self.inner.read(id)
    }

    fn stage(&self, id: &ResourceId, body: &[u8]) -> VaultResult<()> {
        Self::injected(&self.fail_stage, id, "stage")?;
        *self.stages.lock().unwrap().entry(id.clone()).or_default() += 1;
        self.inner.stage(id, body)
    }

    fn commit(&self, id: &ResourceId) -> VaultResult<()> {
        Self::injected(&self.fail_commit, id, "commit")?;
        self.inner.commit(id)
    }

    fn discard(&self, id: &ResourceId) -> VaultResult<()> {
        self.inner.discard(id)
    }

    fn has_staged(&self, id: &ResourceId) -> bool {
        self.inner.has_staged(id)
    }
}

/// In-memory fixture: a controller over `bodies` plus handles to its parts.
pub struct Fixture {
    pub controller: LockController,
    pub memory: Arc<MemoryStore>,
    pub probe: Arc<ProbeStore>,
    pub keys: Arc<KeyPair>,
}

impl Fixture {
    pub fn new(bodies: &[(&str, &[u8])]) -> Self {
        Self::with_auth(bodies, passphrase_auth())
    }

    pub fn with_auth(bodies: &[(&str, &[u8])], auth: Arc<dyn Authenticator>) -> Self {
        init_tracing();
        let memory = Arc::new(MemoryStore::new());
        for (id, body) in bodies {
            memory.insert(*id, body.to_vec());
        }
        let probe = Arc::new(ProbeStore::new(memory.clone()));
        let keys = Arc::new(KeyPair::generate());
        let names: Vec<&str> = bodies.iter().map(|(id, _)| *id).collect();
        let controller = LockController::new(ids(&names), keys.clone(), probe.clone(), auth);
        Self {
            controller,
            memory,
            probe,
            keys,
        }
    }

    pub fn body(&self, id: &str) -> Vec<u8> {
        self.memory.get(&ResourceId::new(id)).unwrap()
    }

    pub fn set_body(&self, id: &str, body: impl Into<Vec<u8>>) {
        self.memory.insert(id, body.into());
    }
}
