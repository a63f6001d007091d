//! Atomic replacement of a record's current file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::types::EntityId;

use super::layout::{StoreLayout, remove_if_exists};

/// Writes record documents so a reader only ever sees the old or the new
/// version in full.
///
/// # Protocol
///
/// 1. Copy the current file to `~bak` (best-effort).
/// 2. Write the document to `~tmp` and fsync it.
/// 3. Rename `~tmp` over the current file.
/// 4. Delete `~bak`.
///
/// The rename is the only point at which the new version becomes visible.
/// Leftover artifacts from an interrupted commit are reconciled by the
/// [`RecoveryScanner`](super::RecoveryScanner) on the next start.
#[derive(Debug, Clone)]
pub struct FileCommitter {
    layout: StoreLayout,
}

impl FileCommitter {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn commit(&self, id: &EntityId, bytes: &[u8]) -> Result<()> {
        let current = self.layout.current_path(id);
        let temp = self.layout.temp_path(id);
        let backup = self.layout.backup_path(id);

        if current.exists()
            && let Err(e) = fs::copy(&current, &backup)
        {
            tracing::warn!("Failed to back up record {} before commit: {}", id, e);
        }

        if let Err(source) = write_atomic(&temp, &current, bytes) {
            if let Err(e) = remove_if_exists(&temp) {
                tracing::warn!("Failed to remove temp file for record {}: {}", id, e);
            }
            if !current.exists() && backup.exists() {
                match fs::rename(&backup, &current) {
                    Ok(()) => tracing::warn!("Restored record {} from backup after failed commit", id),
                    Err(e) => tracing::error!("Failed to restore backup of record {}: {}", id, e),
                }
            }
            return Err(StoreError::WriteFailed {
                entity: id.clone(),
                source,
            });
        }

        if let Err(e) = remove_if_exists(&backup) {
            tracing::debug!("Failed to remove backup of record {}: {}", id, e);
        }

        tracing::debug!("Committed record {} ({} bytes)", id, bytes.len());
        Ok(())
    }

    /// Replace the current file without touching the backup.
    ///
    /// Used when the current file is being rebuilt from a backup or snapshot,
    /// where the backup is the source being promoted and must survive until
    /// the new current file is in place.
    pub fn repair(&self, id: &EntityId, bytes: &[u8]) -> Result<()> {
        let current = self.layout.current_path(id);
        let temp = self.layout.temp_path(id);

        write_atomic(&temp, &current, bytes).map_err(|source| {
            let _ = remove_if_exists(&temp);
            StoreError::WriteFailed {
                entity: id.clone(),
                source,
            }
        })?;

        tracing::debug!("Repaired current file of record {}", id);
        Ok(())
    }
}

/// Write `bytes` to `temp`, fsync, then rename over `target`.
pub(crate) fn write_atomic(temp: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp, target)?;
    sync_parent_dir(target);
    Ok(())
}

/// Persist the rename itself. Best-effort.
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
