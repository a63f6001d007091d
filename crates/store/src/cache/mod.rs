//! In-memory map of live records.
//!
//! Each entry carries its own record lock, an atomic dirty flag, an owner
//! count and a commit gate. The map lock is only held for lookups, inserts
//! and evictions, never across I/O.

mod handle;

pub use handle::RecordHandle;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, StoreError};
use crate::record::{FieldBounds, Record};
use crate::types::EntityId;

/// A record resident in the cache.
#[derive(Debug)]
pub(crate) struct LiveRecord {
    id: EntityId,
    record: RwLock<Record>,
    dirty: AtomicBool,
    owners: AtomicUsize,
    evicted: AtomicBool,
    /// Held for the whole copy-and-commit of this record.
    commit_gate: Arc<tokio::sync::Mutex<()>>,
}

impl LiveRecord {
    pub fn new(id: EntityId, record: Record) -> Self {
        Self {
            id,
            record: RwLock::new(record),
            dirty: AtomicBool::new(false),
            owners: AtomicUsize::new(0),
            evicted: AtomicBool::new(false),
            commit_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn commit_gate(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.commit_gate)
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, Record>> {
        self.record.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Record>> {
        self.record.write().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Record) -> R) -> Result<R> {
        let record = self.read_lock()?;
        Ok(f(&*record))
    }

    /// Mutate under the write lock, re-clamp, and mark dirty before the lock
    /// is released so a concurrent copy never misses the change.
    pub fn update<R>(&self, bounds: &FieldBounds, f: impl FnOnce(&mut Record) -> R) -> Result<R> {
        let mut record = self.write_lock()?;
        if self.is_evicted() {
            return Err(StoreError::Evicted(self.id.clone()));
        }

        let out = f(&mut *record);
        record.clamp(bounds);
        self.dirty.store(true, Ordering::Release);
        Ok(out)
    }

    /// Clear the dirty flag and copy the record, or `None` if it was clean.
    pub fn take_dirty_copy(&self) -> Result<Option<Record>> {
        let record = self.read_lock()?;
        if self.dirty.swap(false, Ordering::AcqRel) {
            Ok(Some(record.clone()))
        } else {
            Ok(None)
        }
    }

    /// Swap in a record that is already durable.
    pub fn replace(&self, replacement: Record) -> Result<()> {
        let mut record = self.write_lock()?;
        *record = replacement;
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    pub fn copy(&self) -> Result<Record> {
        Ok(self.read_lock()?.clone())
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn add_owner(&self) -> usize {
        self.owners.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop one owner, saturating at zero. Returns the remaining count.
    pub fn remove_owner(&self) -> usize {
        let previous = self
            .owners
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }

    pub fn owners(&self) -> usize {
        self.owners.load(Ordering::Acquire)
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }
}

/// Entity id to live record.
#[derive(Debug, Default)]
pub(crate) struct RecordCache {
    entries: RwLock<HashMap<EntityId, Arc<LiveRecord>>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> RwLockReadGuard<'_, HashMap<EntityId, Arc<LiveRecord>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn map_mut(&self) -> RwLockWriteGuard<'_, HashMap<EntityId, Arc<LiveRecord>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &EntityId) -> Option<Arc<LiveRecord>> {
        self.map().get(id).cloned()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.map().contains_key(id)
    }

    /// Look up a resident entry and add an owner while the map lock is held,
    /// so eviction cannot slip in between.
    pub fn acquire_existing(&self, id: &EntityId) -> Option<Arc<LiveRecord>> {
        let map = self.map();
        let live = map.get(id)?;
        live.add_owner();
        Some(Arc::clone(live))
    }

    /// Insert a freshly loaded entry with one owner. If another entry won the
    /// race, that one gains the owner instead.
    pub fn insert_owned(&self, live: LiveRecord) -> Arc<LiveRecord> {
        let mut map = self.map_mut();
        let entry = map
            .entry(live.id().clone())
            .or_insert_with(|| Arc::new(live));
        entry.add_owner();
        Arc::clone(entry)
    }

    /// Remove an entry that has no owners, no unsaved changes and no commit
    /// in flight.
    pub fn evict_if_idle(&self, id: &EntityId) -> bool {
        let mut map = self.map_mut();
        let Some(live) = map.get(id).cloned() else {
            return false;
        };

        // A held gate means a copy is being written; the file on disk is
        // older than the cached record until the commit lands.
        let Ok(_commit) = live.commit_gate.try_lock() else {
            return false;
        };

        // Flag under the record lock so an in-progress update either finishes
        // first or observes the eviction.
        let Ok(_record) = live.record.write() else {
            return false;
        };
        if live.owners() > 0 || live.is_dirty() {
            return false;
        }
        live.evicted.store(true, Ordering::Release);

        map.remove(id);
        true
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.map().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<Arc<LiveRecord>> {
        self.map().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }
}
