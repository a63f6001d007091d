//! Timestamped per-entity snapshot history with bounded retention.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeDelta, Utc};

use crate::codec::RecordCodec;
use crate::error::{Result, StoreError};
use crate::record::Record;
use crate::types::EntityId;

use super::committer::{FileCommitter, write_atomic};
use super::layout::{RECORD_EXTENSION, TEMP_SUFFIX, remove_if_exists};

/// Colon-free UTC timestamp used as the snapshot file stem.
pub const SNAPSHOT_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.6fZ";

pub const DEFAULT_MAX_SNAPSHOTS: usize = 10;

/// Metadata of one stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub entity: EntityId,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl SnapshotInfo {
    /// The identifier accepted by [`SnapshotManager::restore`].
    pub fn timestamp(&self) -> String {
        format_timestamp(self.created_at)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(SNAPSHOT_TIME_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SNAPSHOT_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Writes, lists, prunes and restores snapshots under `history/<id>/`.
///
/// Snapshots are written with the same temp-then-rename step as current
/// files. Restoring the newest valid snapshot re-commits it as the current
/// file so the next load no longer needs recovery.
pub struct SnapshotManager {
    committer: Arc<FileCommitter>,
    codec: Arc<RecordCodec>,
    max_snapshots: usize,
}

impl SnapshotManager {
    pub fn new(committer: Arc<FileCommitter>, codec: Arc<RecordCodec>, max_snapshots: usize) -> Self {
        Self {
            committer,
            codec,
            max_snapshots: max_snapshots.max(1),
        }
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    /// Store `bytes` as a new snapshot and prune to the retention count.
    pub fn snapshot(&self, id: &EntityId, bytes: &[u8]) -> Result<SnapshotInfo> {
        let dir = self.committer.layout().history_dir(id);
        fs::create_dir_all(&dir)?;

        let mut created_at = Utc::now().trunc_subsecs(6);
        if let Some(newest) = self.list(id)?.first()
            && created_at <= newest.created_at
        {
            created_at = newest.created_at + TimeDelta::microseconds(1);
        }

        let stem = format_timestamp(created_at);
        let path = dir.join(format!("{stem}.{RECORD_EXTENSION}"));
        let temp = dir.join(format!("{stem}.{RECORD_EXTENSION}{TEMP_SUFFIX}"));

        if let Err(e) = write_atomic(&temp, &path, bytes) {
            let _ = remove_if_exists(&temp);
            return Err(e.into());
        }

        tracing::debug!("Snapshot {} written for record {}", stem, id);

        let pruned = self.prune(id)?;
        if pruned > 0 {
            tracing::debug!("Pruned {} old snapshots of record {}", pruned, id);
        }

        Ok(SnapshotInfo {
            entity: id.clone(),
            created_at,
            path,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Snapshots of `id`, newest first.
    pub fn list(&self, id: &EntityId) -> Result<Vec<SnapshotInfo>> {
        let dir = self.committer.layout().history_dir(id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(name) = path.file_name().and_then(|s| s.to_str())
                && let Some(stem) = name
                    .strip_suffix(RECORD_EXTENSION)
                    .and_then(|s| s.strip_suffix('.'))
                && let Some(created_at) = parse_timestamp(stem)
            {
                snapshots.push(SnapshotInfo {
                    entity: id.clone(),
                    created_at,
                    size_bytes: entry.metadata()?.len(),
                    path,
                });
            }
        }

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    /// Delete all but the newest `max_snapshots`, returning how many went.
    pub fn prune(&self, id: &EntityId) -> Result<usize> {
        let mut removed = 0;
        for stale in self.list(id)?.into_iter().skip(self.max_snapshots) {
            remove_if_exists(&stale.path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Newest snapshot that decodes, re-committed as the current file.
    pub fn restore_newest_valid(&self, id: &EntityId) -> Result<Option<Record>> {
        for info in self.list(id)? {
            let bytes = match fs::read(&info.path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Snapshot {} of record {} unreadable: {}", info.timestamp(), id, e);
                    continue;
                }
            };

            match self.codec.decode(&bytes) {
                Ok(decoded) => {
                    self.committer.repair(id, &self.codec.encode(&decoded.record)?)?;
                    tracing::warn!(
                        "Record {} restored from snapshot {}",
                        id,
                        info.timestamp()
                    );
                    return Ok(Some(decoded.record));
                }
                Err(e) => {
                    tracing::warn!("Snapshot {} of record {} skipped: {}", info.timestamp(), id, e);
                }
            }
        }

        Ok(None)
    }

    /// Restore a specific snapshot through a normal commit.
    pub fn restore(&self, id: &EntityId, timestamp: &str) -> Result<Record> {
        let not_found = || StoreError::SnapshotNotFound {
            entity: id.clone(),
            timestamp: timestamp.to_string(),
        };

        let wanted = parse_timestamp(timestamp).ok_or_else(not_found)?;
        let info = self
            .list(id)?
            .into_iter()
            .find(|info| info.created_at == wanted)
            .ok_or_else(not_found)?;

        let record = self.codec.decode(&fs::read(&info.path)?)?.record;
        self.committer.commit(id, &self.codec.encode(&record)?)?;

        tracing::info!("Record {} restored to snapshot {}", id, timestamp);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreLayout;
    use tempfile::TempDir;

    fn manager(max: usize) -> (TempDir, SnapshotManager, EntityId) {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::create(dir.path()).unwrap();
        let manager = SnapshotManager::new(
            Arc::new(FileCommitter::new(layout)),
            Arc::new(RecordCodec::default()),
            max,
        );
        (dir, manager, EntityId::parse("p1").unwrap())
    }

    fn doc(balance: i64) -> Vec<u8> {
        format!(r#"{{"schemaVersion":2,"economy":{{"balance":{balance}}}}}"#).into_bytes()
    }

    #[test]
    fn timestamps_round_trip_through_file_names() {
        let at = Utc::now().trunc_subsecs(6);
        let text = format_timestamp(at);

        assert!(!text.contains(':'));
        assert!(text.ends_with('Z'));
        assert_eq!(parse_timestamp(&text), Some(at));
    }

    #[test]
    fn retention_keeps_newest_snapshots() {
        let (_dir, manager, id) = manager(3);

        let mut written = Vec::new();
        for balance in 0..6 {
            written.push(manager.snapshot(&id, &doc(balance)).unwrap());
        }

        let kept = manager.list(&id).unwrap();
        assert_eq!(kept.len(), 3);
        let expected: Vec<_> = written.iter().rev().take(3).map(|s| s.created_at).collect();
        let actual: Vec<_> = kept.iter().map(|s| s.created_at).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn rapid_snapshots_get_distinct_increasing_names() {
        let (_dir, manager, id) = manager(10);

        let first = manager.snapshot(&id, &doc(1)).unwrap();
        let second = manager.snapshot(&id, &doc(2)).unwrap();

        assert!(second.created_at > first.created_at);
        assert_ne!(first.timestamp(), second.timestamp());
    }

    #[test]
    fn restore_newest_valid_skips_corrupt_snapshots_and_heals_current() {
        let (_dir, manager, id) = manager(5);
        manager.snapshot(&id, &doc(40)).unwrap();
        manager.snapshot(&id, b"{ torn").unwrap();

        let record = manager.restore_newest_valid(&id).unwrap().unwrap();
        assert_eq!(record.economy.balance, 40);

        let current = manager.committer.layout().current_path(&id);
        let healed = manager.codec.decode(&fs::read(current).unwrap()).unwrap();
        assert_eq!(healed.record.economy.balance, 40);
    }

    #[test]
    fn restore_newest_valid_without_history_is_none() {
        let (_dir, manager, id) = manager(5);
        assert!(manager.restore_newest_valid(&id).unwrap().is_none());
    }

    #[test]
    fn restore_specific_timestamp() {
        let (_dir, manager, id) = manager(5);
        let older = manager.snapshot(&id, &doc(10)).unwrap();
        manager.snapshot(&id, &doc(20)).unwrap();

        let record = manager.restore(&id, &older.timestamp()).unwrap();
        assert_eq!(record.economy.balance, 10);

        let missing = manager.restore(&id, "2000-01-01T00-00-00.000000Z");
        assert!(matches!(missing, Err(StoreError::SnapshotNotFound { .. })));
    }
}
