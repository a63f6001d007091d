//! Forward-only schema migrations over raw record documents.
//!
//! Each step is a pure function keyed by the version it migrates *from*.
//! Steps only add or rename fields and never overwrite a destination that
//! already exists, so re-running a step on a partially migrated artifact is a
//! no-op.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::SchemaVersion;

/// Version written by this build.
pub const CURRENT_SCHEMA_VERSION: SchemaVersion = 2;

/// Version assumed for documents that predate the version tag.
pub const LEGACY_SCHEMA_VERSION: SchemaVersion = 1;

/// Track that legacy top-level `level`/`experience` move into.
pub const LEGACY_TRACK: &str = "main";

pub(crate) const VERSION_FIELD: &str = "schemaVersion";

pub type Document = Map<String, Value>;
pub type MigrationStep = fn(&mut Document);

/// What happened to a document's schema version during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate,
    Migrated {
        from: SchemaVersion,
        to: SchemaVersion,
    },
    /// Written by a newer build; loaded as-is without migration.
    Skipped {
        found: SchemaVersion,
        current: SchemaVersion,
    },
}

/// Ordered table of migration steps, applied up to `current`.
#[derive(Debug, Clone)]
pub struct MigrationTable {
    current: SchemaVersion,
    steps: BTreeMap<SchemaVersion, MigrationStep>,
}

impl MigrationTable {
    pub fn new(current: SchemaVersion) -> Self {
        Self {
            current,
            steps: BTreeMap::new(),
        }
    }

    /// The table for [`CURRENT_SCHEMA_VERSION`].
    pub fn standard() -> Self {
        Self::new(CURRENT_SCHEMA_VERSION).register(1, v1_to_v2)
    }

    pub fn register(mut self, from: SchemaVersion, step: MigrationStep) -> Self {
        self.steps.insert(from, step);
        self
    }

    pub fn current_version(&self) -> SchemaVersion {
        self.current
    }

    /// Bring `doc` up to the current version in place.
    pub fn apply(&self, doc: &mut Document) -> MigrationOutcome {
        let found = document_version(doc);

        if found > self.current {
            return MigrationOutcome::Skipped {
                found,
                current: self.current,
            };
        }
        if found == self.current {
            return MigrationOutcome::UpToDate;
        }

        for (_, step) in self.steps.range(found..self.current) {
            step(doc);
        }
        doc.insert(VERSION_FIELD.to_string(), Value::from(self.current));

        MigrationOutcome::Migrated {
            from: found,
            to: self.current,
        }
    }
}

impl Default for MigrationTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Version tag of a raw document, defaulting to the legacy version.
pub(crate) fn document_version(doc: &Document) -> SchemaVersion {
    doc.get(VERSION_FIELD)
        .and_then(Value::as_u64)
        .filter(|version| *version > 0)
        .map(|version| SchemaVersion::try_from(version).unwrap_or(SchemaVersion::MAX))
        .unwrap_or(LEGACY_SCHEMA_VERSION)
}

/// v1 kept economy and progression fields at the top level.
pub fn v1_to_v2(doc: &mut Document) {
    move_field(doc, "money", &["economy", "balance"]);
    move_field(doc, "totalEarned", &["economy", "lifetimeEarned"]);
    move_field(doc, "totalSpent", &["economy", "lifetimeSpent"]);
    move_field(
        doc,
        "processedTransactions",
        &["economy", "recentTransactions"],
    );
    move_field(doc, "level", &["progression", "tracks", LEGACY_TRACK, "level"]);
    move_field(
        doc,
        "experience",
        &["progression", "tracks", LEGACY_TRACK, "experience"],
    );
}

/// Rename a top-level field to a nested destination unless it already exists.
///
/// When the destination is taken the legacy value is dropped. When a parent
/// on the path is not an object the legacy field stays where it was.
fn move_field(doc: &mut Document, legacy: &str, path: &[&str]) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    let Some(value) = doc.remove(legacy) else {
        return;
    };

    match object_at(doc, parents) {
        Some(target) => {
            target.entry(leaf.to_string()).or_insert(value);
        }
        None => {
            doc.insert(legacy.to_string(), value);
        }
    }
}

fn object_at<'a>(doc: &'a mut Document, path: &[&str]) -> Option<&'a mut Document> {
    let mut cursor = doc;
    for key in path {
        cursor = cursor
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()?;
    }
    Some(cursor)
}
