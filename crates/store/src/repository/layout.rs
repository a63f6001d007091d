//! File naming inside a store root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::EntityId;

pub const RECORD_EXTENSION: &str = "rec";
pub const TEMP_SUFFIX: &str = "~tmp";
pub const BACKUP_SUFFIX: &str = "~bak";
pub const HISTORY_DIR: &str = "history";

/// Which artifact of a record a file name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Current,
    Temp,
    Backup,
}

/// Paths of every artifact under a store root.
///
/// ```text
/// <root>/<id>.rec                       current document
/// <root>/<id>.rec~tmp                   in-flight write
/// <root>/<id>.rec~bak                   rollback copy
/// <root>/history/<id>/<timestamp>.rec   snapshots
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Open a layout, creating the root and history directories.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(HISTORY_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current_path(&self, id: &EntityId) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    pub fn temp_path(&self, id: &EntityId) -> PathBuf {
        self.root
            .join(format!("{id}.{RECORD_EXTENSION}{TEMP_SUFFIX}"))
    }

    pub fn backup_path(&self, id: &EntityId) -> PathBuf {
        self.root
            .join(format!("{id}.{RECORD_EXTENSION}{BACKUP_SUFFIX}"))
    }

    pub fn history_root(&self) -> PathBuf {
        self.root.join(HISTORY_DIR)
    }

    pub fn history_dir(&self, id: &EntityId) -> PathBuf {
        self.history_root().join(id.as_str())
    }

    /// Identifiers with any artifact in the root directory, sorted.
    pub fn list_record_ids(&self) -> Result<Vec<EntityId>> {
        let mut ids: Vec<EntityId> = self
            .scan_root()?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Every recognised artifact in the root directory.
    pub fn scan_root(&self) -> Result<Vec<(EntityId, FileKind)>> {
        let mut found = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Some(artifact) = classify(name)
            {
                found.push(artifact);
            }
        }

        Ok(found)
    }
}

/// Parse a root-directory file name into its entity and artifact kind.
pub fn classify(file_name: &str) -> Option<(EntityId, FileKind)> {
    let (stem, kind) = if let Some(stem) = file_name.strip_suffix(TEMP_SUFFIX) {
        (stem, FileKind::Temp)
    } else if let Some(stem) = file_name.strip_suffix(BACKUP_SUFFIX) {
        (stem, FileKind::Backup)
    } else {
        (file_name, FileKind::Current)
    };

    let id = stem
        .strip_suffix(RECORD_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))?;

    EntityId::parse(id).ok().map(|id| (id, kind))
}

/// Read a file, mapping "not found" to `None`.
pub fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a file, treating "not found" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    #[test]
    fn classify_recognises_every_artifact() {
        assert_eq!(classify("p1.rec"), Some((id("p1"), FileKind::Current)));
        assert_eq!(classify("p1.rec~tmp"), Some((id("p1"), FileKind::Temp)));
        assert_eq!(classify("p1.rec~bak"), Some((id("p1"), FileKind::Backup)));
        assert_eq!(classify("p1.json"), None);
        assert_eq!(classify(".rec"), None);
        assert_eq!(classify("bad id.rec"), None);
    }

    #[test]
    fn list_record_ids_deduplicates_artifacts() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::create(dir.path()).unwrap();

        fs::write(layout.current_path(&id("b")), b"{}").unwrap();
        fs::write(layout.backup_path(&id("b")), b"{}").unwrap();
        fs::write(layout.temp_path(&id("a")), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(layout.list_record_ids().unwrap(), vec![id("a"), id("b")]);
        assert!(layout.history_root().is_dir());
    }
}
