//! Bounded set of recently processed transaction identifiers.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::TransactionId;

/// Insertion-ordered set holding the last `capacity` transaction ids.
///
/// The set is queried from the owning context while the persistence copy may
/// be cloning it, so it carries its own lock and every method takes `&self`.
/// Membership is an O(1) hash lookup; the oldest id is evicted on overflow.
pub struct IdempotencySet {
    inner: Mutex<Inner>,
}

struct Inner {
    order: VecDeque<TransactionId>,
    members: HashSet<TransactionId>,
    capacity: usize,
}

impl IdempotencySet {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::with_capacity(capacity),
                members: HashSet::with_capacity(capacity),
                capacity,
            }),
        }
    }

    /// Build a set from ids listed oldest first. Overflow keeps the newest.
    pub fn from_ids<I>(capacity: usize, ids: I) -> Self
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let set = Self::with_capacity(capacity);
        for id in ids {
            set.insert(id);
        }
        set
    }

    /// Insert an id. Returns `false` if it was already present.
    pub fn insert(&self, id: impl Into<TransactionId>) -> bool {
        let id = id.into();
        let mut inner = self.lock();

        if inner.members.contains(&id) {
            return false;
        }

        if inner.order.len() == inner.capacity
            && let Some(oldest) = inner.order.pop_front()
        {
            inner.members.remove(&oldest);
        }

        inner.members.insert(id.clone());
        inner.order.push_back(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.order.clear();
        inner.members.clear();
    }

    /// Ids in insertion order, oldest first.
    pub fn to_vec(&self) -> Vec<TransactionId> {
        self.lock().order.iter().cloned().collect()
    }

    // `order` and `members` are consistent between statements; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for IdempotencySet {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl Clone for IdempotencySet {
    fn clone(&self) -> Self {
        let inner = self.lock();
        Self {
            inner: Mutex::new(Inner {
                order: inner.order.clone(),
                members: inner.members.clone(),
                capacity: inner.capacity,
            }),
        }
    }
}

impl PartialEq for IdempotencySet {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.capacity() == other.capacity() && self.to_vec() == other.to_vec()
    }
}

impl fmt::Debug for IdempotencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("IdempotencySet")
            .field("capacity", &inner.capacity)
            .field("ids", &inner.order)
            .finish()
    }
}
