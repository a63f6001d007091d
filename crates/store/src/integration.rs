//! Hook for an external item stash.
//!
//! The host can install a stash that holds payloads on behalf of an entity
//! (for example items that did not fit and must be handed back later). The
//! store only forwards calls; it never inspects payloads.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::types::EntityId;

/// Receipt for a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StashHandle(pub u64);

#[async_trait]
pub trait ExternalStash: Send + Sync {
    async fn store(&self, owner: &EntityId, reason: &str, payload: Value) -> Result<StashHandle>;

    /// Hand back every stashed payload that belongs to one of `worlds`.
    /// Returns how many were restored.
    async fn restore_all_in_worlds(&self, worlds: &[String]) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StashedPayload {
    pub handle: StashHandle,
    pub owner: EntityId,
    pub reason: String,
    pub payload: Value,
}

impl StashedPayload {
    /// World the payload belongs to, read from its `world` field.
    pub fn world(&self) -> Option<&str> {
        self.payload.get("world").and_then(Value::as_str)
    }
}

/// In-process stash.
#[derive(Debug, Default)]
pub struct MemoryStash {
    state: Mutex<MemoryStashState>,
}

#[derive(Debug, Default)]
struct MemoryStashState {
    next_handle: u64,
    pending: Vec<StashedPayload>,
    restored: Vec<StashedPayload>,
}

impl MemoryStash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Result<Vec<StashedPayload>> {
        Ok(self.lock()?.pending.clone())
    }

    pub fn restored(&self) -> Result<Vec<StashedPayload>> {
        Ok(self.lock()?.restored.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryStashState>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl ExternalStash for MemoryStash {
    async fn store(&self, owner: &EntityId, reason: &str, payload: Value) -> Result<StashHandle> {
        if !payload.is_object() {
            return Err(StoreError::Stash(format!(
                "payload for {owner} must be a JSON object"
            )));
        }

        let mut state = self.lock()?;
        state.next_handle += 1;
        let handle = StashHandle(state.next_handle);

        state.pending.push(StashedPayload {
            handle,
            owner: owner.clone(),
            reason: reason.to_string(),
            payload,
        });

        tracing::debug!("Stashed payload {:?} for {} ({})", handle, owner, reason);
        Ok(handle)
    }

    async fn restore_all_in_worlds(&self, worlds: &[String]) -> Result<usize> {
        let mut state = self.lock()?;

        let (restore, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|item| item.world().is_some_and(|w| worlds.iter().any(|x| x == w)));

        let count = restore.len();
        state.pending = keep;
        state.restored.extend(restore);

        Ok(count)
    }
}
