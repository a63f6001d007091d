//! Startup reconciliation of artifacts left by interrupted commits.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::codec::RecordCodec;
use crate::error::Result;
use crate::types::EntityId;

use super::committer::FileCommitter;
use super::layout::{FileKind, TEMP_SUFFIX, read_optional, remove_if_exists};

/// What the scanner did for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Current and temp both existed; the temp was deleted.
    DiscardedTemp,
    /// Only the temp existed; it became the current file.
    PromotedTemp,
    /// The temp was torn and a backup existed; the backup became current.
    RestoredBackupOverTornTemp,
    /// Current and backup both existed; both were left in place.
    KeptBackup,
    /// Only the backup existed; it was copied to current.
    RestoredBackup,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RecoveryAction::DiscardedTemp => "discarded temp",
            RecoveryAction::PromotedTemp => "promoted temp",
            RecoveryAction::RestoredBackupOverTornTemp => "restored backup over torn temp",
            RecoveryAction::KeptBackup => "kept backup",
            RecoveryAction::RestoredBackup => "restored backup",
        };
        f.write_str(text)
    }
}

/// Outcome of one recovery scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub actions: Vec<(EntityId, RecoveryAction)>,
    pub failures: Vec<(EntityId, String)>,
    pub orphaned_snapshot_temps: usize,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.actions.is_empty() && self.failures.is_empty() && self.orphaned_snapshot_temps == 0
    }

    pub fn action_for(&self, id: &EntityId) -> Option<RecoveryAction> {
        self.actions
            .iter()
            .find(|(entity, _)| entity == id)
            .map(|(_, action)| *action)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Artifacts {
    current: bool,
    temp: bool,
    backup: bool,
}

/// Reconciles `~tmp` and `~bak` artifacts into a consistent current file.
///
/// | current | tmp | bak | action                      |
/// |---------|-----|-----|-----------------------------|
/// | yes     | yes | any | delete tmp                  |
/// | no      | yes | any | promote tmp, delete bak      |
/// | yes     | no  | yes | leave as-is                 |
/// | no      | no  | yes | copy bak to current         |
///
/// A temp that fails to decode is only promoted when there is no backup to
/// fall back to, so no recoverable artifact is ever deleted.
pub struct RecoveryScanner<'a> {
    committer: &'a FileCommitter,
    codec: &'a RecordCodec,
}

impl<'a> RecoveryScanner<'a> {
    pub fn new(committer: &'a FileCommitter, codec: &'a RecordCodec) -> Self {
        Self { committer, codec }
    }

    pub fn scan(&self) -> Result<RecoveryReport> {
        let layout = self.committer.layout();
        let mut report = RecoveryReport::default();

        let mut entities: BTreeMap<EntityId, Artifacts> = BTreeMap::new();
        for (id, kind) in layout.scan_root()? {
            let artifacts = entities.entry(id).or_default();
            match kind {
                FileKind::Current => artifacts.current = true,
                FileKind::Temp => artifacts.temp = true,
                FileKind::Backup => artifacts.backup = true,
            }
        }

        for (id, artifacts) in entities {
            match self.reconcile(&id, artifacts) {
                Ok(Some(action)) => {
                    tracing::info!("Recovery: record {}: {}", id, action);
                    report.actions.push((id, action));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Recovery: record {} could not be reconciled: {}", id, e);
                    report.failures.push((id, e.to_string()));
                }
            }
        }

        report.orphaned_snapshot_temps = sweep_snapshot_temps(&layout.history_root())?;

        if report.is_clean() {
            tracing::debug!("Recovery scan found nothing to reconcile");
        } else {
            tracing::info!(
                "Recovery scan finished: {} actions, {} failures, {} snapshot temps removed",
                report.actions.len(),
                report.failures.len(),
                report.orphaned_snapshot_temps
            );
        }

        Ok(report)
    }

    fn reconcile(&self, id: &EntityId, artifacts: Artifacts) -> Result<Option<RecoveryAction>> {
        let layout = self.committer.layout();
        let current = layout.current_path(id);
        let temp = layout.temp_path(id);
        let backup = layout.backup_path(id);

        let action = match artifacts {
            Artifacts {
                current: true,
                temp: true,
                ..
            } => {
                remove_if_exists(&temp)?;
                RecoveryAction::DiscardedTemp
            }
            Artifacts {
                current: false,
                temp: true,
                backup: has_backup,
            } => {
                let temp_is_valid = read_optional(&temp)?
                    .is_some_and(|bytes| self.codec.decode(&bytes).is_ok());

                if !temp_is_valid
                    && has_backup
                    && let Some(bytes) = read_optional(&backup)?
                {
                    self.committer.repair(id, &bytes)?;
                    tracing::warn!("Recovery: temp file of record {} was torn", id);
                    RecoveryAction::RestoredBackupOverTornTemp
                } else {
                    fs::rename(&temp, &current)?;
                    if has_backup {
                        remove_if_exists(&backup)?;
                    }
                    RecoveryAction::PromotedTemp
                }
            }
            Artifacts {
                current: true,
                temp: false,
                backup: true,
            } => RecoveryAction::KeptBackup,
            Artifacts {
                current: false,
                temp: false,
                backup: true,
            } => match read_optional(&backup)? {
                Some(bytes) => {
                    self.committer.repair(id, &bytes)?;
                    RecoveryAction::RestoredBackup
                }
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        Ok(Some(action))
    }
}

/// Delete half-written snapshot files under every history directory.
fn sweep_snapshot_temps(history_root: &Path) -> Result<usize> {
    if !history_root.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entity_dir in fs::read_dir(history_root)? {
        let entity_dir = entity_dir?;
        if !entity_dir.file_type()?.is_dir() {
            continue;
        }
        for entry in fs::read_dir(entity_dir.path())? {
            let entry = entry?;
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(TEMP_SUFFIX));
            if is_temp {
                remove_if_exists(&entry.path())?;
                removed += 1;
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreLayout;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        layout: StoreLayout,
        committer: FileCommitter,
        codec: RecordCodec,
        id: EntityId,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::create(dir.path()).unwrap();
        Fixture {
            _dir: dir,
            committer: FileCommitter::new(layout.clone()),
            layout,
            codec: RecordCodec::default(),
            id: EntityId::parse("p1").unwrap(),
        }
    }

    fn doc(balance: i64) -> Vec<u8> {
        format!(r#"{{"schemaVersion":2,"economy":{{"balance":{balance}}}}}"#).into_bytes()
    }

    fn balance(f: &Fixture) -> i64 {
        let bytes = fs::read(f.layout.current_path(&f.id)).unwrap();
        f.codec.decode(&bytes).unwrap().record.economy.balance
    }

    fn scan(f: &Fixture) -> RecoveryReport {
        RecoveryScanner::new(&f.committer, &f.codec).scan().unwrap()
    }

    #[test]
    fn current_wins_over_temp() {
        let f = fixture();
        fs::write(f.layout.current_path(&f.id), doc(1)).unwrap();
        fs::write(f.layout.temp_path(&f.id), doc(2)).unwrap();

        let report = scan(&f);

        assert_eq!(report.action_for(&f.id), Some(RecoveryAction::DiscardedTemp));
        assert_eq!(balance(&f), 1);
        assert!(!f.layout.temp_path(&f.id).exists());
    }

    #[test]
    fn lone_temp_is_promoted() {
        let f = fixture();
        fs::write(f.layout.temp_path(&f.id), doc(7)).unwrap();

        let report = scan(&f);

        assert_eq!(report.action_for(&f.id), Some(RecoveryAction::PromotedTemp));
        assert_eq!(balance(&f), 7);
        assert!(!f.layout.temp_path(&f.id).exists());
    }

    #[test]
    fn promoted_temp_replaces_backup() {
        let f = fixture();
        fs::write(f.layout.temp_path(&f.id), doc(8)).unwrap();
        fs::write(f.layout.backup_path(&f.id), doc(6)).unwrap();

        let report = scan(&f);

        assert_eq!(report.action_for(&f.id), Some(RecoveryAction::PromotedTemp));
        assert_eq!(balance(&f), 8);
        assert!(!f.layout.temp_path(&f.id).exists());
        assert!(!f.layout.backup_path(&f.id).exists());
    }

    #[test]
    fn torn_temp_falls_back_to_backup() {
        let f = fixture();
        fs::write(f.layout.temp_path(&f.id), b"{\"schemaVer").unwrap();
        fs::write(f.layout.backup_path(&f.id), doc(3)).unwrap();

        let report = scan(&f);

        assert_eq!(
            report.action_for(&f.id),
            Some(RecoveryAction::RestoredBackupOverTornTemp)
        );
        assert_eq!(balance(&f), 3);
    }

    #[test]
    fn backup_is_kept_next_to_current() {
        let f = fixture();
        fs::write(f.layout.current_path(&f.id), doc(5)).unwrap();
        fs::write(f.layout.backup_path(&f.id), doc(4)).unwrap();

        let report = scan(&f);

        assert_eq!(report.action_for(&f.id), Some(RecoveryAction::KeptBackup));
        assert_eq!(balance(&f), 5);
        assert!(f.layout.backup_path(&f.id).exists());
    }

    #[test]
    fn lone_backup_is_copied_to_current() {
        let f = fixture();
        fs::write(f.layout.backup_path(&f.id), doc(9)).unwrap();

        let report = scan(&f);

        assert_eq!(report.action_for(&f.id), Some(RecoveryAction::RestoredBackup));
        assert_eq!(balance(&f), 9);
    }

    #[test]
    fn snapshot_temps_are_swept() {
        let f = fixture();
        let history = f.layout.history_dir(&f.id);
        fs::create_dir_all(&history).unwrap();
        fs::write(history.join("2024-01-01T00-00-00.000000Z.rec~tmp"), b"{").unwrap();
        fs::write(history.join("2024-01-01T00-00-01.000000Z.rec"), doc(1)).unwrap();

        let report = scan(&f);

        assert_eq!(report.orphaned_snapshot_temps, 1);
        assert_eq!(fs::read_dir(&history).unwrap().count(), 1);
    }

    #[test]
    fn clean_store_reports_nothing() {
        let f = fixture();
        fs::write(f.layout.current_path(&f.id), doc(1)).unwrap();

        assert!(scan(&f).is_clean());
    }
}
