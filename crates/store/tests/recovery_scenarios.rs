use std::fs;
use std::path::Path;

use record_store::{EntityId, RecordPolicy, RecordStore, RecoveryAction, StoreConfig};
use serde_json::{Value, json};
use tempfile::TempDir;

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig::new(dir.path())
        .without_workers()
        .with_policy(RecordPolicy::default().with_starting_balance(10))
}

fn id(raw: &str) -> EntityId {
    EntityId::parse(raw).expect("valid id")
}

fn doc(balance: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({ "schemaVersion": 2, "economy": { "balance": balance } })).unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).expect("file exists")).expect("valid json")
}

/// Process killed after the temp write but before the rename: the old
/// current file stays authoritative and the temp is discarded.
#[tokio::test]
async fn test_kill_between_temp_write_and_rename() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("p1.rec"), doc(1)).unwrap();
    fs::write(dir.path().join("p1.rec~tmp"), doc(2)).unwrap();
    fs::write(dir.path().join("p1.rec~bak"), doc(1)).unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();

    assert_eq!(
        store.recovery_report().action_for(&id("p1")),
        Some(RecoveryAction::DiscardedTemp)
    );
    assert!(!dir.path().join("p1.rec~tmp").exists());

    let record = store.handle().read_record(&id("p1")).await.unwrap();
    assert_eq!(record.economy.balance, 1);
    store.shutdown().await.unwrap();
}

/// Killed after the current file was removed but with a complete temp.
#[tokio::test]
async fn test_only_temp_is_promoted() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("p1.rec~tmp"), doc(42)).unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();

    assert_eq!(
        store.recovery_report().action_for(&id("p1")),
        Some(RecoveryAction::PromotedTemp)
    );
    let record = store.handle().read_record(&id("p1")).await.unwrap();
    assert_eq!(record.economy.balance, 42);
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_current_is_authoritative_and_backup_preserved() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("p1.rec"), doc(5)).unwrap();
    fs::write(dir.path().join("p1.rec~bak"), doc(4)).unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();

    assert_eq!(
        store.recovery_report().action_for(&id("p1")),
        Some(RecoveryAction::KeptBackup)
    );
    assert!(dir.path().join("p1.rec~bak").exists());

    let record = store.handle().read_record(&id("p1")).await.unwrap();
    assert_eq!(record.economy.balance, 5);
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_torn_temp_with_backup_restores_backup() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("p1.rec~tmp"), &doc(9)[..6]).unwrap();
    fs::write(dir.path().join("p1.rec~bak"), doc(8)).unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();

    assert_eq!(
        store.recovery_report().action_for(&id("p1")),
        Some(RecoveryAction::RestoredBackupOverTornTemp)
    );
    let record = store.handle().read_record(&id("p1")).await.unwrap();
    assert_eq!(record.economy.balance, 8);
    store.shutdown().await.unwrap();
}

/// A v1 document with `money = 100` loads as `economy.balance = 100` at v2
/// and is written back in the new shape.
#[tokio::test]
async fn test_legacy_money_migrates_on_load() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("legacy.rec"),
        br#"{ "schemaVersion": 1, "money": 100, "level": 3 }"#,
    )
    .unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();
    let handle = store.handle();

    let record = handle.acquire(&id("legacy")).await.unwrap();
    assert_eq!(record.read(|r| r.economy.balance).unwrap(), 100);
    assert_eq!(record.read(|r| r.schema_version).unwrap(), 2);
    assert_eq!(record.read(|r| r.track("main").level).unwrap(), 3);
    assert!(record.is_dirty(), "migrated records are scheduled for saving");

    store.shutdown().await.unwrap();

    let on_disk = read_json(&dir.path().join("legacy.rec"));
    assert_eq!(on_disk["schemaVersion"], json!(2));
    assert_eq!(on_disk["economy"]["balance"], json!(100));
    assert!(on_disk.get("money").is_none());
}

/// Corrupt current file plus one valid snapshot: the snapshot is returned and
/// the current file is repaired.
#[tokio::test]
async fn test_corrupt_current_recovers_from_snapshot() {
    let dir = TempDir::new().unwrap();
    let history = dir.path().join("history").join("p1");
    fs::create_dir_all(&history).unwrap();
    fs::write(history.join("2024-05-01T10-00-00.000000Z.rec"), doc(77)).unwrap();
    fs::write(dir.path().join("p1.rec"), b"").unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();
    let record = store.handle().read_record(&id("p1")).await.unwrap();

    assert_eq!(record.economy.balance, 77);
    assert_eq!(read_json(&dir.path().join("p1.rec"))["economy"]["balance"], json!(77));
    store.shutdown().await.unwrap();
}

/// Nothing decodes: a fresh record replaces the corrupt file.
#[tokio::test]
async fn test_exhausted_recovery_creates_fresh_record() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("p1.rec"), b"\0\0\0\0").unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();
    let record = store.handle().read_record(&id("p1")).await.unwrap();

    assert_eq!(record.economy.balance, 10);
    assert_eq!(read_json(&dir.path().join("p1.rec"))["economy"]["balance"], json!(10));
    store.shutdown().await.unwrap();
}

/// A record written by a newer build keeps its version tag.
#[tokio::test]
async fn test_future_schema_version_is_preserved() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("p1.rec"),
        br#"{ "schemaVersion": 5, "economy": { "balance": 3 } }"#,
    )
    .unwrap();

    let store = RecordStore::open(config(&dir)).await.unwrap();
    let handle = store.handle();
    handle
        .modify(&id("p1"), |r| r.economy.balance += 1)
        .await
        .unwrap();
    store.shutdown().await.unwrap();

    let on_disk = read_json(&dir.path().join("p1.rec"));
    assert_eq!(on_disk["schemaVersion"], json!(5));
    assert_eq!(on_disk["economy"]["balance"], json!(4));
}
