//! File-backed persistence: layout, atomic commits, recovery and snapshots.
//!
//! Everything here is synchronous and expects to run on a blocking thread;
//! the store drives it through `spawn_blocking`.

mod committer;
mod layout;
mod recovery;
mod snapshot;

pub use committer::FileCommitter;
pub use layout::{
    BACKUP_SUFFIX, FileKind, HISTORY_DIR, RECORD_EXTENSION, StoreLayout, TEMP_SUFFIX, classify,
    read_optional,
};
pub use recovery::{RecoveryAction, RecoveryReport, RecoveryScanner};
pub use snapshot::{
    DEFAULT_MAX_SNAPSHOTS, SNAPSHOT_TIME_FORMAT, SnapshotInfo, SnapshotManager, format_timestamp,
    parse_timestamp,
};
