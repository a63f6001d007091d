//! Cloneable façade over the record store.
//!
//! [`StoreHandle`] owns nothing but an `Arc` of shared state, so it can be
//! handed to every consumer and to the background workers. File I/O always
//! runs on tokio's blocking pool.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;

use crate::cache::{LiveRecord, RecordCache, RecordHandle};
use crate::codec::RecordCodec;
use crate::error::{Result, StoreError};
use crate::integration::{ExternalStash, StashHandle};
use crate::load::{LoadSource, Loader};
use crate::record::{FieldPath, Record};
use crate::repository::{FileCommitter, SnapshotInfo, SnapshotManager, read_optional};
use crate::types::EntityId;

pub(crate) struct StoreInner {
    pub committer: Arc<FileCommitter>,
    pub codec: Arc<RecordCodec>,
    pub snapshots: SnapshotManager,
    pub cache: RecordCache,
    /// Serializes cold loads so two callers never load the same file twice.
    pub load_gate: tokio::sync::Mutex<()>,
    pub runtime: tokio::runtime::Handle,
    pub stash: Option<Arc<dyn ExternalStash>>,
}

/// Result of one autosave pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutosaveReport {
    pub saved: usize,
    pub failed: usize,
    /// Dirty records whose commit gate was busy; retried next pass.
    pub skipped: usize,
    pub evicted: usize,
}

/// Result of one snapshot pass over the cached records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub written: usize,
    pub failed: usize,
}

/// Client-facing handle to the record store.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<StoreInner>,
}

impl StoreHandle {
    pub(crate) fn new(inner: StoreInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.inner.codec
    }

    /// Take ownership of a record, loading or creating it if needed.
    ///
    /// Every `acquire` must be paired with a [`release`](Self::release).
    pub async fn acquire(&self, id: &EntityId) -> Result<RecordHandle> {
        let live = self.pin(id).await?;
        Ok(self.record_handle(live))
    }

    /// Drop one ownership. Commits if dirty and evicts once no owner is left.
    ///
    /// Never blocks; the commit runs in the background.
    pub fn release(&self, id: &EntityId) {
        let Some(live) = self.inner.cache.get(id) else {
            tracing::debug!("Release of record {} that is not loaded", id);
            return;
        };
        live.remove_owner();

        let store = self.clone();
        self.inner.runtime.spawn(async move {
            if let Err(e) = store.settle(&live).await {
                tracing::error!("Failed to save released record {}: {}", live.id(), e);
            }
        });
    }

    /// Like [`release`](Self::release) but waits for the commit.
    pub async fn release_and_wait(&self, id: &EntityId) -> Result<()> {
        let live = self
            .inner
            .cache
            .get(id)
            .ok_or_else(|| StoreError::NotLoaded(id.clone()))?;
        live.remove_owner();
        self.settle(&live).await
    }

    pub fn is_loaded(&self, id: &EntityId) -> bool {
        self.inner.cache.contains(id)
    }

    /// Number of records currently resident in memory.
    pub fn loaded_count(&self) -> usize {
        self.inner.cache.len()
    }

    /// Flag a cached record for the next autosave. Returns `false` when the
    /// record is not loaded.
    pub fn mark_dirty(&self, id: &EntityId) -> bool {
        match self.inner.cache.get(id) {
            Some(live) => {
                live.mark_dirty();
                true
            }
            None => false,
        }
    }

    /// Commit a cached record now, dirty or not.
    pub async fn save_now(&self, id: &EntityId) -> Result<()> {
        let live = self
            .inner
            .cache
            .get(id)
            .ok_or_else(|| StoreError::NotLoaded(id.clone()))?;

        let gate = live.commit_gate();
        let _gate = gate.lock().await;
        live.mark_dirty();
        self.commit_locked(&live).await?;
        Ok(())
    }

    /// Commit every dirty cached record, waiting for in-flight commits.
    ///
    /// All records are attempted; the first failure is returned.
    pub async fn save_all(&self) -> Result<usize> {
        let mut saved = 0;
        let mut first_error = None;

        for live in self.inner.cache.entries() {
            match self.persist(&live).await {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Failed to save record {}: {}", live.id(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    /// One autosave pass: commit dirty records concurrently, skipping any
    /// whose commit is already in flight, then evict idle entries.
    pub async fn autosave_tick(&self) -> AutosaveReport {
        let mut report = AutosaveReport::default();
        let mut commits = JoinSet::new();

        for live in self.inner.cache.entries() {
            if !live.is_dirty() {
                continue;
            }
            let Ok(gate) = live.commit_gate().try_lock_owned() else {
                report.skipped += 1;
                continue;
            };

            let store = self.clone();
            commits.spawn(async move {
                let _gate = gate;
                let result = store.commit_locked(&live).await;
                (live, result)
            });
        }

        while let Some(joined) = commits.join_next().await {
            match joined {
                Ok((_, Ok(true))) => report.saved += 1,
                Ok((_, Ok(false))) => {}
                Ok((live, Err(e))) => {
                    report.failed += 1;
                    tracing::error!("Autosave of record {} failed: {}", live.id(), e);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Autosave task failed: {}", e);
                }
            }
        }

        for live in self.inner.cache.entries() {
            if live.owners() == 0 && self.inner.cache.evict_if_idle(live.id()) {
                report.evicted += 1;
            }
        }

        if report.saved > 0 || report.failed > 0 {
            tracing::debug!(
                "Autosave: {} saved, {} failed, {} busy, {} evicted",
                report.saved,
                report.failed,
                report.skipped,
                report.evicted
            );
        }

        report
    }

    /// Identifiers with a file on disk or an entry in the cache, sorted.
    pub async fn list_all_known_ids(&self) -> Result<Vec<EntityId>> {
        let inner = Arc::clone(&self.inner);
        let mut ids = tokio::task::spawn_blocking(move || inner.committer.layout().list_record_ids())
            .await
            .map_err(StoreError::TaskJoin)??;

        ids.extend(self.inner.cache.ids());
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Persist the record and copy its current file into history.
    pub async fn create_snapshot(&self, id: &EntityId) -> Result<SnapshotInfo> {
        let live = self.pin(id).await?;
        let result = self.snapshot_entry(&live).await;
        live.remove_owner();
        self.settle(&live).await?;
        result
    }

    pub async fn list_snapshots(&self, id: &EntityId) -> Result<Vec<SnapshotInfo>> {
        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        tokio::task::spawn_blocking(move || inner.snapshots.list(&id))
            .await
            .map_err(StoreError::TaskJoin)?
    }

    /// Replace a record with the snapshot taken at `timestamp`.
    pub async fn restore_snapshot(&self, id: &EntityId, timestamp: &str) -> Result<Record> {
        let live = self.pin(id).await?;

        let result = async {
            let gate = live.commit_gate();
            let _gate = gate.lock().await;

            let inner = Arc::clone(&self.inner);
            let entity = id.clone();
            let timestamp = timestamp.to_string();
            let record =
                tokio::task::spawn_blocking(move || inner.snapshots.restore(&entity, &timestamp))
                    .await
                    .map_err(StoreError::TaskJoin)??;

            live.replace(record.clone())?;
            Ok::<_, StoreError>(record)
        }
        .await;

        live.remove_owner();
        self.settle(&live).await?;
        result
    }

    /// Mutate a record without keeping ownership. The record is saved and,
    /// unless someone else owns it, evicted afterwards.
    pub async fn modify<R, F>(&self, id: &EntityId, f: F) -> Result<R>
    where
        F: FnOnce(&mut Record) -> R,
    {
        let live = self.pin(id).await?;
        let result = live.update(&self.inner.codec.policy().bounds, f);
        live.remove_owner();
        self.settle(&live).await?;
        result
    }

    /// Copy of a record, loading it transiently if needed.
    pub async fn read_record(&self, id: &EntityId) -> Result<Record> {
        let live = self.pin(id).await?;
        let result = live.copy();
        live.remove_owner();
        self.settle(&live).await?;
        result
    }

    /// Reset one field path (e.g. `economy.balance`) to its default.
    pub async fn reset_field(&self, id: &EntityId, path: &str) -> Result<()> {
        let field: FieldPath = path.parse()?;
        let policy = self.inner.codec.policy().clone();

        self.modify(id, |record| field.reset(record, &policy)).await?;
        tracing::info!("Reset {} of record {}", field, id);
        Ok(())
    }

    /// Snapshot every known record, then replace it with a fresh one.
    pub async fn reset_all(&self) -> Result<usize> {
        let ids = self.list_all_known_ids().await?;

        for id in &ids {
            self.create_snapshot(id).await?;
            let fresh = self.inner.codec.fresh_record();
            self.modify(id, |record| *record = fresh).await?;
        }

        tracing::warn!("Reset all {} records", ids.len());
        Ok(ids.len())
    }

    /// Snapshot every cached record.
    pub async fn snapshot_live_records(&self) -> SnapshotReport {
        let mut report = SnapshotReport::default();

        for live in self.inner.cache.entries() {
            match self.snapshot_entry(&live).await {
                Ok(_) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Snapshot of record {} failed: {}", live.id(), e);
                }
            }
        }

        report
    }

    pub async fn stash(&self, owner: &EntityId, reason: &str, payload: Value) -> Result<StashHandle> {
        let stash = self.inner.stash.as_ref().ok_or(StoreError::StashUnavailable)?;
        stash.store(owner, reason, payload).await
    }

    pub async fn restore_stashed(&self, worlds: &[String]) -> Result<usize> {
        let stash = self.inner.stash.as_ref().ok_or(StoreError::StashUnavailable)?;
        stash.restore_all_in_worlds(worlds).await
    }

    fn record_handle(&self, live: Arc<LiveRecord>) -> RecordHandle {
        RecordHandle::new(live, Arc::clone(&self.inner.codec))
    }

    /// Cached entry with one extra owner, loading it if needed.
    async fn pin(&self, id: &EntityId) -> Result<Arc<LiveRecord>> {
        if let Some(live) = self.inner.cache.acquire_existing(id) {
            return Ok(live);
        }

        let _load = self.inner.load_gate.lock().await;
        if let Some(live) = self.inner.cache.acquire_existing(id) {
            return Ok(live);
        }

        let inner = Arc::clone(&self.inner);
        let entity = id.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            Loader {
                committer: &inner.committer,
                codec: &inner.codec,
                snapshots: &inner.snapshots,
            }
            .load(&entity)
        })
        .await
        .map_err(StoreError::TaskJoin)??;

        if loaded.source != LoadSource::Current {
            tracing::debug!("Loaded record {} from {}", id, loaded.source);
        }

        let live = LiveRecord::new(id.clone(), loaded.record);
        if loaded.migrated {
            live.mark_dirty();
        }
        Ok(self.inner.cache.insert_owned(live))
    }

    /// Commit if dirty, then evict if nobody owns the entry.
    async fn settle(&self, live: &Arc<LiveRecord>) -> Result<()> {
        self.persist(live).await?;
        if live.owners() == 0 && self.inner.cache.evict_if_idle(live.id()) {
            tracing::debug!("Evicted record {}", live.id());
        }
        Ok(())
    }

    /// Commit under the entry's gate. Returns whether anything was written.
    async fn persist(&self, live: &Arc<LiveRecord>) -> Result<bool> {
        let gate = live.commit_gate();
        let _gate = gate.lock().await;
        self.commit_locked(live).await
    }

    /// Copy and commit. The caller must hold the entry's commit gate.
    async fn commit_locked(&self, live: &Arc<LiveRecord>) -> Result<bool> {
        let Some(record) = live.take_dirty_copy()? else {
            return Ok(false);
        };

        let inner = Arc::clone(&self.inner);
        let id = live.id().clone();
        let result = tokio::task::spawn_blocking(move || {
            let bytes = inner.codec.encode(&record)?;
            inner.committer.commit(&id, &bytes)
        })
        .await
        .map_err(StoreError::TaskJoin)
        .and_then(|committed| committed);

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                live.mark_dirty();
                Err(e)
            }
        }
    }

    async fn snapshot_entry(&self, live: &Arc<LiveRecord>) -> Result<SnapshotInfo> {
        let gate = live.commit_gate();
        let _gate = gate.lock().await;
        self.commit_locked(live).await?;

        let fallback = live.copy()?;
        let inner = Arc::clone(&self.inner);
        let id = live.id().clone();
        tokio::task::spawn_blocking(move || {
            let bytes = match read_optional(&inner.committer.layout().current_path(&id))? {
                Some(bytes) => bytes,
                None => inner.codec.encode(&fallback)?,
            };
            inner.snapshots.snapshot(&id, &bytes)
        })
        .await
        .map_err(StoreError::TaskJoin)?
    }
}
