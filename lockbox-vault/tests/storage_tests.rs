use std::path::PathBuf;

use lockbox_vault::config::DEFAULT_STAGING_SUFFIX;
use lockbox_vault::journal::{BatchKind, BatchPhase, JournalRecord, PendingBatch};
use lockbox_vault::{
    FileStore, LockConfig, MemoryStore, ResourceId, ResourceStore, SessionJournal, VaultError,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

// ============================================================================
// FileStore
// ============================================================================

#[test]
fn file_store_stages_beside_target() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "live").unwrap();
    let id = ResourceId::from(path.as_path());
    let store = FileStore::default();

    store.stage(&id, b"next").unwrap();
    assert!(store.has_staged(&id));
    assert_eq!(store.read(&id).unwrap(), b"live");

    let mut staged = path.clone().into_os_string();
    staged.push(DEFAULT_STAGING_SUFFIX);
    assert_eq!(std::fs::read(PathBuf::from(staged)).unwrap(), b"next");

    store.commit(&id).unwrap();
    assert!(!store.has_staged(&id));
    assert_eq!(store.read(&id).unwrap(), b"next");
}

#[test]
fn file_store_discard_removes_staged_body() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "live").unwrap();
    let id = ResourceId::from(path);
    let store = FileStore::new(".pending");

    store.stage(&id, b"next").unwrap();
    store.discard(&id).unwrap();
    assert!(!store.has_staged(&id));
    assert_eq!(store.read(&id).unwrap(), b"live");

    // Nothing staged is fine.
    store.discard(&id).unwrap();
}

#[test]
fn file_store_missing_resource_is_io_error() {
    let dir = tempdir().unwrap();
    let id = ResourceId::from(dir.path().join("absent.txt"));
    let store = FileStore::default();

    match store.read(&id) {
        Err(VaultError::ResourceIo { resource, .. }) => assert_eq!(resource, id),
        other => panic!("expected ResourceIo, got {other:?}"),
    }
    assert!(store.commit(&id).is_err());
}

// ============================================================================
// MemoryStore
// ============================================================================

#[test]
fn memory_store_two_phase_write() {
    let store = MemoryStore::new();
    store.insert("k", "v1");
    let id = ResourceId::new("k");

    store.stage(&id, b"v2").unwrap();
    assert_eq!(store.get(&id).unwrap(), b"v1");
    store.commit(&id).unwrap();
    assert_eq!(store.get(&id).unwrap(), b"v2");
    assert_eq!(store.ids(), vec![id]);
}

#[test]
fn memory_store_unknown_id_is_io_error() {
    let store = MemoryStore::new();
    assert!(matches!(
        store.read(&ResourceId::new("nope")),
        Err(VaultError::ResourceIo { .. })
    ));
}

// ============================================================================
// SessionJournal
// ============================================================================

#[test]
fn journal_round_trips_pending_batch() {
    let dir = tempdir().unwrap();
    let journal = SessionJournal::new(dir.path().join("nested/session.json"));
    let mut record = JournalRecord::new(vec![ResourceId::new("a"), ResourceId::new("b")], 3);
    record.pending = Some(PendingBatch {
        kind: BatchKind::Unlock,
        from_depth: 3,
        to_depth: 2,
        phase: BatchPhase::Committing,
    });

    journal.save(&record).unwrap();
    assert!(journal.exists());
    assert_eq!(journal.load().unwrap(), Some(record));
    assert!(!dir.path().join("nested/session.json.tmp").exists());
}

#[test]
fn journal_uses_snake_case_tags() {
    let dir = tempdir().unwrap();
    let journal = SessionJournal::new(dir.path().join("session.json"));
    let mut record = JournalRecord::new(vec![ResourceId::new("a")], 0);
    record.pending = Some(PendingBatch {
        kind: BatchKind::Lock,
        from_depth: 0,
        to_depth: 1,
        phase: BatchPhase::Staging,
    });
    journal.save(&record).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(journal.path()).unwrap()).unwrap();
    assert_eq!(json["pending"]["kind"], "lock");
    assert_eq!(json["pending"]["phase"], "staging");
    assert_eq!(json["resources"][0], "a");
}

#[test]
fn missing_journal_loads_as_none() {
    let dir = tempdir().unwrap();
    let journal = SessionJournal::new(dir.path().join("session.json"));
    assert_eq!(journal.load().unwrap(), None);
    journal.clear().unwrap();
}

#[test]
fn unknown_journal_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, r#"{"version":9,"resources":[],"depth":0,"pending":null}"#).unwrap();
    assert!(matches!(SessionJournal::new(&path).load(), Err(VaultError::Journal(_))));
}

#[test]
fn garbage_journal_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(SessionJournal::new(&path).load(), Err(VaultError::Journal(_))));
}

#[test]
fn clear_removes_journal() {
    let dir = tempdir().unwrap();
    let journal = SessionJournal::new(dir.path().join("session.json"));
    journal.save(&JournalRecord::new(vec![], 1)).unwrap();
    journal.clear().unwrap();
    assert!(!journal.exists());
}

// ============================================================================
// LockConfig
// ============================================================================

#[test]
fn default_config_escalates_in_parallel() {
    let config = LockConfig::default();
    assert!(config.escalate_on_denial);
    assert!(config.parallel);
    assert_eq!(config.journal_path, None);
    assert_eq!(config.staging_suffix, DEFAULT_STAGING_SUFFIX);
    assert!(config.key_path.ends_with("identity.json"));
    config.validate().unwrap();
}

#[test]
fn missing_config_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let config = LockConfig::load(dir.path().join("lockbox.json")).unwrap();
    assert_eq!(config, LockConfig::default());
}

#[test]
fn partial_config_fills_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lockbox.json");
    std::fs::write(&path, r#"{"escalate_on_denial": false, "journal_path": "/tmp/s.json"}"#)
        .unwrap();

    let config = LockConfig::load(&path).unwrap();
    assert!(!config.escalate_on_denial);
    assert!(config.parallel);
    assert_eq!(config.journal_path, Some(PathBuf::from("/tmp/s.json")));
    assert_eq!(config.staging_suffix, DEFAULT_STAGING_SUFFIX);
}

#[test]
fn config_round_trips_through_json() {
    let config = LockConfig {
        key_path: PathBuf::from("/keys/id.json"),
        journal_path: Some(PathBuf::from("/state/j.json")),
        staging_suffix: ".stage".into(),
        escalate_on_denial: false,
        parallel: false,
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: LockConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn malformed_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lockbox.json");
    std::fs::write(&path, "parallel = true").unwrap();
    assert!(matches!(LockConfig::load(&path), Err(VaultError::Config(_))));
}

#[test]
fn bad_staging_suffix_is_rejected() {
    for suffix in ["", "/x", "a\\b"] {
        let config = LockConfig {
            staging_suffix: suffix.to_string(),
            ..LockConfig::default()
        };
        assert!(matches!(config.validate(), Err(VaultError::Config(_))), "{suffix:?}");
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("lockbox.json");
    std::fs::write(&path, r#"{"staging_suffix": ""}"#).unwrap();
    assert!(matches!(LockConfig::load(&path), Err(VaultError::Config(_))));
}
