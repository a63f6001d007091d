//! Field bounds and defaults applied to every record.

use std::collections::BTreeMap;

use super::IdempotencySet;

/// Per-field bounds, kept in one place instead of at each accessor.
///
/// Amounts, counters, cooldowns and experience are floored at zero. Levels
/// are bounded by a per-track cap; tracks without an explicit cap use
/// `default_level_cap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBounds {
    pub default_level_cap: i64,
    pub level_caps: BTreeMap<String, i64>,
}

impl FieldBounds {
    pub fn with_level_cap(mut self, track: impl Into<String>, cap: i64) -> Self {
        self.level_caps.insert(track.into(), cap);
        self
    }

    pub fn level_cap(&self, track: &str) -> i64 {
        self.level_caps
            .get(track)
            .copied()
            .unwrap_or(self.default_level_cap)
            .max(0)
    }

    pub fn clamp_level(&self, track: &str, level: i64) -> i64 {
        level.clamp(0, self.level_cap(track))
    }

    pub fn clamp_amount(value: i64) -> i64 {
        value.max(0)
    }
}

impl Default for FieldBounds {
    fn default() -> Self {
        Self {
            default_level_cap: 100,
            level_caps: BTreeMap::new(),
        }
    }
}

/// Defaults for fresh records plus the bounds every load re-applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPolicy {
    /// Balance granted to a record created on first access
    pub starting_balance: i64,
    /// Flags set on a record created on first access
    pub default_flags: BTreeMap<String, bool>,
    /// Number of transaction ids remembered per record
    pub idempotency_capacity: usize,
    pub bounds: FieldBounds,
}

impl RecordPolicy {
    pub fn with_starting_balance(mut self, balance: i64) -> Self {
        self.starting_balance = FieldBounds::clamp_amount(balance);
        self
    }

    pub fn with_default_flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.default_flags.insert(key.into(), value);
        self
    }

    pub fn with_idempotency_capacity(mut self, capacity: usize) -> Self {
        self.idempotency_capacity = capacity.max(1);
        self
    }

    pub fn with_bounds(mut self, bounds: FieldBounds) -> Self {
        self.bounds = bounds;
        self
    }
}

impl Default for RecordPolicy {
    fn default() -> Self {
        Self {
            starting_balance: 0,
            default_flags: BTreeMap::new(),
            idempotency_capacity: IdempotencySet::DEFAULT_CAPACITY,
            bounds: FieldBounds::default(),
        }
    }
}
