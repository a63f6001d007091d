//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::record::RecordPolicy;
use crate::repository::DEFAULT_MAX_SNAPSHOTS;

/// Configuration shared by the store and its background workers.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding current files, artifacts and `history/`
    pub root_dir: PathBuf,
    pub autosave_enabled: bool,
    pub autosave_interval: Duration,
    pub snapshot_enabled: bool,
    pub snapshot_interval: Duration,
    /// Snapshots retained per entity (at least 1)
    pub max_snapshots: usize,
    pub command_buffer_size: usize,
    pub policy: RecordPolicy,
}

impl StoreConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_autosave(mut self, enabled: bool, interval: Duration) -> Self {
        self.autosave_enabled = enabled;
        self.autosave_interval = interval;
        self
    }

    pub fn with_snapshots(mut self, enabled: bool, interval: Duration) -> Self {
        self.snapshot_enabled = enabled;
        self.snapshot_interval = interval;
        self
    }

    pub fn with_max_snapshots(mut self, max_snapshots: usize) -> Self {
        self.max_snapshots = max_snapshots.max(1);
        self
    }

    pub fn with_policy(mut self, policy: RecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Disable both background workers; saves happen only on explicit calls.
    pub fn without_workers(mut self) -> Self {
        self.autosave_enabled = false;
        self.snapshot_enabled = false;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("records"),
            autosave_enabled: true,
            autosave_interval: Duration::from_secs(60),
            snapshot_enabled: true,
            snapshot_interval: Duration::from_secs(30 * 60),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            command_buffer_size: 8,
            policy: RecordPolicy::default(),
        }
    }
}
