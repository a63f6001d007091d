//! Load-or-recover for a single record.
//!
//! Recovery order when the current file is missing or corrupt:
//! backup, newest valid snapshot, then a fresh record. Only the last step
//! loses data, and it is logged as such.

use std::fmt;

use crate::codec::{MigrationOutcome, RecordCodec};
use crate::error::{DecodeError, Result};
use crate::record::Record;
use crate::repository::{FileCommitter, SnapshotManager, read_optional};
use crate::types::EntityId;

/// Where a loaded record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Current,
    Backup,
    Snapshot,
    /// No artifact existed; a fresh record was created.
    Created,
    /// Artifacts existed but none decoded; a fresh record replaced them.
    RecoveryExhausted,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LoadSource::Current => "current",
            LoadSource::Backup => "backup",
            LoadSource::Snapshot => "snapshot",
            LoadSource::Created => "created",
            LoadSource::RecoveryExhausted => "recovery exhausted",
        };
        f.write_str(text)
    }
}

#[derive(Debug)]
pub struct LoadedRecord {
    pub record: Record,
    pub source: LoadSource,
    /// Loaded from an older schema; the upgraded form is not on disk yet.
    pub migrated: bool,
}

pub(crate) struct Loader<'a> {
    pub committer: &'a FileCommitter,
    pub codec: &'a RecordCodec,
    pub snapshots: &'a SnapshotManager,
}

impl Loader<'_> {
    pub fn load(&self, id: &EntityId) -> Result<LoadedRecord> {
        let layout = self.committer.layout();
        let mut had_artifacts = false;

        if let Some(bytes) = read_optional(&layout.current_path(id))? {
            had_artifacts = true;
            match self.codec.decode(&bytes) {
                Ok(decoded) => {
                    let migrated = log_migration(id, decoded.migration);
                    return Ok(LoadedRecord {
                        record: decoded.record,
                        source: LoadSource::Current,
                        migrated,
                    });
                }
                Err(DecodeError::Corrupt(reason)) => {
                    tracing::warn!("Current file of record {} is corrupt: {}", id, reason);
                }
            }
        }

        if let Some(bytes) = read_optional(&layout.backup_path(id))? {
            had_artifacts = true;
            match self.codec.decode(&bytes) {
                Ok(decoded) => {
                    self.committer
                        .repair(id, &self.codec.encode(&decoded.record)?)?;
                    tracing::warn!("Record {} recovered from backup", id);
                    return Ok(LoadedRecord {
                        record: decoded.record,
                        source: LoadSource::Backup,
                        migrated: false,
                    });
                }
                Err(DecodeError::Corrupt(reason)) => {
                    tracing::warn!("Backup of record {} is corrupt: {}", id, reason);
                }
            }
        }

        if let Some(record) = self.snapshots.restore_newest_valid(id)? {
            return Ok(LoadedRecord {
                record,
                source: LoadSource::Snapshot,
                migrated: false,
            });
        }
        had_artifacts |= !self.snapshots.list(id)?.is_empty();

        let record = self.codec.fresh_record();
        self.committer.commit(id, &self.codec.encode(&record)?)?;

        let source = if had_artifacts {
            tracing::warn!(
                "Record {} could not be recovered from any artifact; replaced with a fresh record",
                id
            );
            LoadSource::RecoveryExhausted
        } else {
            tracing::info!("Created record {}", id);
            LoadSource::Created
        };

        Ok(LoadedRecord {
            record,
            source,
            migrated: false,
        })
    }
}

fn log_migration(id: &EntityId, outcome: MigrationOutcome) -> bool {
    match outcome {
        MigrationOutcome::UpToDate => false,
        MigrationOutcome::Migrated { from, to } => {
            tracing::info!("Record {} migrated from schema v{} to v{}", id, from, to);
            true
        }
        MigrationOutcome::Skipped { found, current } => {
            tracing::warn!(
                "Record {} has schema v{} newer than v{}; loaded without migration",
                id,
                found,
                current
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use crate::record::RecordPolicy;
    use crate::repository::StoreLayout;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        committer: Arc<FileCommitter>,
        codec: Arc<RecordCodec>,
        snapshots: SnapshotManager,
        id: EntityId,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let layout = StoreLayout::create(dir.path()).unwrap();
            let committer = Arc::new(FileCommitter::new(layout));
            let codec = Arc::new(RecordCodec::new(
                RecordPolicy::default().with_starting_balance(25),
            ));
            let snapshots = SnapshotManager::new(Arc::clone(&committer), Arc::clone(&codec), 5);
            Self {
                _dir: dir,
                committer,
                codec,
                snapshots,
                id: EntityId::parse("p1").unwrap(),
            }
        }

        fn load(&self) -> LoadedRecord {
            Loader {
                committer: &self.committer,
                codec: &self.codec,
                snapshots: &self.snapshots,
            }
            .load(&self.id)
            .unwrap()
        }

        fn current(&self) -> std::path::PathBuf {
            self.committer.layout().current_path(&self.id)
        }
    }

    fn doc(balance: i64) -> Vec<u8> {
        format!(r#"{{"schemaVersion":2,"economy":{{"balance":{balance}}}}}"#).into_bytes()
    }

    #[test]
    fn missing_record_is_created_and_persisted() {
        let f = Fixture::new();

        let loaded = f.load();

        assert_eq!(loaded.source, LoadSource::Created);
        assert_eq!(loaded.record.economy.balance, 25);
        assert!(f.current().exists());
    }

    #[test]
    fn corrupt_current_falls_back_to_backup() {
        let f = Fixture::new();
        fs::write(f.current(), b"").unwrap();
        fs::write(f.committer.layout().backup_path(&f.id), doc(60)).unwrap();

        let loaded = f.load();

        assert_eq!(loaded.source, LoadSource::Backup);
        assert_eq!(loaded.record.economy.balance, 60);
        let healed = f.codec.decode(&fs::read(f.current()).unwrap()).unwrap();
        assert_eq!(healed.record.economy.balance, 60);
    }

    #[test]
    fn corrupt_everything_is_reported_as_data_loss() {
        let f = Fixture::new();
        fs::write(f.current(), b"{ nope").unwrap();
        f.snapshots.snapshot(&f.id, b"also nope").unwrap();

        let loaded = f.load();

        assert_eq!(loaded.source, LoadSource::RecoveryExhausted);
        assert_eq!(loaded.record.economy.balance, 25);
    }

    #[test]
    fn legacy_record_is_flagged_as_migrated() {
        let f = Fixture::new();
        fs::write(f.current(), br#"{ "money": 100 }"#).unwrap();

        let loaded = f.load();

        assert_eq!(loaded.source, LoadSource::Current);
        assert!(loaded.migrated);
        assert_eq!(loaded.record.economy.balance, 100);
    }
}
