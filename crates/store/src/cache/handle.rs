use std::sync::Arc;

use crate::codec::RecordCodec;
use crate::error::Result;
use crate::record::Record;
use crate::types::EntityId;

use super::LiveRecord;

/// Access to one cached record.
///
/// Handles are cheap to clone. Every mutation goes through [`update`] or
/// [`record_transaction`], which re-apply field bounds and mark the record
/// dirty. Once the entry has been released and evicted, mutations fail with
/// [`StoreError::Evicted`](crate::StoreError::Evicted).
///
/// [`update`]: RecordHandle::update
/// [`record_transaction`]: RecordHandle::record_transaction
#[derive(Clone)]
pub struct RecordHandle {
    live: Arc<LiveRecord>,
    codec: Arc<RecordCodec>,
}

impl RecordHandle {
    pub(crate) fn new(live: Arc<LiveRecord>, codec: Arc<RecordCodec>) -> Self {
        Self { live, codec }
    }

    pub fn id(&self) -> &EntityId {
        self.live.id()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Record) -> R) -> Result<R> {
        self.live.read(f)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Record) -> R) -> Result<R> {
        self.live.update(&self.codec.policy().bounds, f)
    }

    /// Apply `f` once per transaction id.
    ///
    /// Returns `None` without touching the record when `tx_id` is among the
    /// recently processed ids.
    pub fn record_transaction<R>(
        &self,
        tx_id: &str,
        f: impl FnOnce(&mut Record) -> R,
    ) -> Result<Option<R>> {
        self.update(|record| {
            if record.economy.recent_transactions.contains(tx_id) {
                return None;
            }
            let out = f(record);
            record.economy.recent_transactions.insert(tx_id);
            Some(out)
        })
    }

    pub fn has_processed(&self, tx_id: &str) -> Result<bool> {
        self.read(|record| record.economy.recent_transactions.contains(tx_id))
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> Result<Record> {
        self.live.copy()
    }

    pub fn mark_dirty(&self) {
        self.live.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.live.is_dirty()
    }

    pub fn is_evicted(&self) -> bool {
        self.live.is_evicted()
    }
}

impl std::fmt::Debug for RecordHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordHandle")
            .field("id", self.live.id())
            .field("dirty", &self.live.is_dirty())
            .field("owners", &self.live.owners())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordPolicy;

    fn handle() -> RecordHandle {
        let codec = Arc::new(RecordCodec::new(RecordPolicy::default().with_starting_balance(10)));
        let live = LiveRecord::new(EntityId::parse("p1").unwrap(), codec.fresh_record());
        RecordHandle::new(Arc::new(live), codec)
    }

    #[test]
    fn transactions_apply_once() {
        let handle = handle();

        let first = handle
            .record_transaction("tx-1", |r| {
                r.economy.balance += 5;
                r.economy.balance
            })
            .unwrap();
        let replay = handle
            .record_transaction("tx-1", |r| {
                r.economy.balance += 5;
                r.economy.balance
            })
            .unwrap();

        assert_eq!(first, Some(15));
        assert_eq!(replay, None);
        assert_eq!(handle.read(|r| r.economy.balance).unwrap(), 15);
        assert!(handle.has_processed("tx-1").unwrap());
    }

    #[test]
    fn update_clamps_and_marks_dirty() {
        let handle = handle();
        assert!(!handle.is_dirty());

        handle.update(|r| r.economy.balance -= 50).unwrap();

        assert!(handle.is_dirty());
        assert_eq!(handle.snapshot().unwrap().economy.balance, 0);
    }
}
