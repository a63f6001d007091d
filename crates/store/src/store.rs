//! Store orchestrator.
//!
//! [`RecordStore`] runs crash recovery before serving anything, owns the
//! background workers, and hands out cloneable [`StoreHandle`]s.

use std::sync::Arc;

use crate::cache::RecordCache;
use crate::codec::{MigrationTable, RecordCodec};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::handle::{StoreHandle, StoreInner};
use crate::integration::ExternalStash;
use crate::repository::{FileCommitter, RecoveryReport, RecoveryScanner, SnapshotManager, StoreLayout};
use crate::workers::{AutosaveTask, PeriodicWorker, SnapshotTask, TickReport, WorkerHandle};

/// Durable per-entity record store.
///
/// Design: the store owns the workers; [`StoreHandle`] is the cloneable
/// façade consumers use. Call [`shutdown`](Self::shutdown) to stop the
/// workers and flush every dirty record.
pub struct RecordStore {
    handle: StoreHandle,
    recovery: RecoveryReport,
    autosave_worker: Option<WorkerHandle>,
    snapshot_worker: Option<WorkerHandle>,
}

impl RecordStore {
    pub fn builder() -> RecordStoreBuilder {
        RecordStoreBuilder::new()
    }

    /// Open a store with default collaborators.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        Self::builder().config(config).build().await
    }

    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }

    /// What the startup recovery scan did.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Trigger an autosave pass through the worker, or inline when the
    /// worker is disabled.
    pub async fn run_autosave_now(&self) -> Result<TickReport> {
        match &self.autosave_worker {
            Some(worker) => worker.run_now().await,
            None => {
                let report = self.handle.autosave_tick().await;
                Ok(TickReport {
                    succeeded: report.saved,
                    failed: report.failed,
                })
            }
        }
    }

    /// Trigger a snapshot pass through the worker, or inline when the
    /// worker is disabled.
    pub async fn run_snapshots_now(&self) -> Result<TickReport> {
        match &self.snapshot_worker {
            Some(worker) => worker.run_now().await,
            None => {
                let report = self.handle.snapshot_live_records().await;
                Ok(TickReport {
                    succeeded: report.written,
                    failed: report.failed,
                })
            }
        }
    }

    /// Stop the workers, then commit every dirty record.
    pub async fn shutdown(self) -> Result<()> {
        for worker in [self.autosave_worker, self.snapshot_worker]
            .into_iter()
            .flatten()
        {
            worker.shutdown().await?;
        }

        let saved = self.handle.save_all().await?;
        tracing::info!("Record store shut down ({} records flushed)", saved);
        Ok(())
    }
}

/// Builder for [`RecordStore`].
pub struct RecordStoreBuilder {
    config: StoreConfig,
    migrations: Option<MigrationTable>,
    stash: Option<Arc<dyn ExternalStash>>,
}

impl RecordStoreBuilder {
    fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            migrations: None,
            stash: None,
        }
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the standard migration table.
    pub fn migrations(mut self, migrations: MigrationTable) -> Self {
        self.migrations = Some(migrations);
        self
    }

    pub fn stash(mut self, stash: Arc<dyn ExternalStash>) -> Self {
        self.stash = Some(stash);
        self
    }

    /// Run recovery and start the enabled workers.
    pub async fn build(self) -> Result<RecordStore> {
        let config = self.config;

        let mut codec = RecordCodec::new(config.policy.clone());
        if let Some(migrations) = self.migrations {
            codec = codec.with_migrations(migrations);
        }
        let codec = Arc::new(codec);

        let root = config.root_dir.clone();
        let scan_codec = Arc::clone(&codec);
        let (committer, recovery) = tokio::task::spawn_blocking(move || {
            let committer = FileCommitter::new(StoreLayout::create(&root)?);
            let report = RecoveryScanner::new(&committer, &scan_codec).scan()?;
            Ok::<_, StoreError>((committer, report))
        })
        .await
        .map_err(StoreError::TaskJoin)??;
        let committer = Arc::new(committer);

        let snapshots =
            SnapshotManager::new(Arc::clone(&committer), Arc::clone(&codec), config.max_snapshots);

        let handle = StoreHandle::new(StoreInner {
            committer,
            codec,
            snapshots,
            cache: RecordCache::new(),
            load_gate: tokio::sync::Mutex::new(()),
            runtime: tokio::runtime::Handle::current(),
            stash: self.stash,
        });

        let autosave_worker = config.autosave_enabled.then(|| {
            PeriodicWorker::spawn(
                AutosaveTask::new(handle.clone()),
                config.autosave_interval,
                config.command_buffer_size,
            )
        });
        let snapshot_worker = config.snapshot_enabled.then(|| {
            PeriodicWorker::spawn(
                SnapshotTask::new(handle.clone()),
                config.snapshot_interval,
                config.command_buffer_size,
            )
        });

        tracing::info!(
            "Record store opened at {} (autosave: {}, snapshots: {}, retention: {})",
            config.root_dir.display(),
            config.autosave_enabled,
            config.snapshot_enabled,
            config.max_snapshots
        );

        Ok(RecordStore {
            handle,
            recovery,
            autosave_worker,
            snapshot_worker,
        })
    }
}
