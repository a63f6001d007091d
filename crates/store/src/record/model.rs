//! The durable record and its namespaces.

use std::collections::BTreeMap;

use crate::codec::CURRENT_SCHEMA_VERSION;
use crate::types::{SchemaVersion, TimestampMs};

use super::{FieldBounds, IdempotencySet, RecordPolicy};

/// Full state of one entity.
///
/// Consumers read and mutate the public fields through a
/// [`RecordHandle`](crate::RecordHandle); the store re-applies
/// [`FieldBounds`] after every mutation and on every load.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub schema_version: SchemaVersion,
    pub economy: Economy,
    pub progression: Progression,
    pub flags: BTreeMap<String, bool>,
    pub cooldowns: BTreeMap<String, TimestampMs>,
    pub counters: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Economy {
    pub balance: i64,
    pub lifetime_earned: i64,
    pub lifetime_spent: i64,
    pub recent_transactions: IdempotencySet,
}

/// Leveled tracks keyed by track identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Progression {
    pub tracks: BTreeMap<String, TrackProgress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackProgress {
    pub level: i64,
    pub experience: i64,
}

impl Record {
    /// A record created on first access, with policy defaults applied.
    pub fn fresh(policy: &RecordPolicy) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            economy: Economy {
                balance: FieldBounds::clamp_amount(policy.starting_balance),
                lifetime_earned: 0,
                lifetime_spent: 0,
                recent_transactions: IdempotencySet::with_capacity(policy.idempotency_capacity),
            },
            progression: Progression::default(),
            flags: policy.default_flags.clone(),
            cooldowns: BTreeMap::new(),
            counters: BTreeMap::new(),
        }
    }

    /// Pull every numeric field back inside its bounds.
    pub fn clamp(&mut self, bounds: &FieldBounds) {
        self.economy.balance = FieldBounds::clamp_amount(self.economy.balance);
        self.economy.lifetime_earned = FieldBounds::clamp_amount(self.economy.lifetime_earned);
        self.economy.lifetime_spent = FieldBounds::clamp_amount(self.economy.lifetime_spent);

        for (track, progress) in self.progression.tracks.iter_mut() {
            progress.level = bounds.clamp_level(track, progress.level);
            progress.experience = FieldBounds::clamp_amount(progress.experience);
        }

        for value in self.cooldowns.values_mut() {
            *value = FieldBounds::clamp_amount(*value);
        }
        for value in self.counters.values_mut() {
            *value = FieldBounds::clamp_amount(*value);
        }
    }

    pub fn counter(&self, key: &str) -> i64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    /// Add `delta` to a counter, returning the new (unclamped) value.
    pub fn add_counter(&mut self, key: &str, delta: i64) -> i64 {
        let value = self.counters.entry(key.to_string()).or_insert(0);
        *value = value.saturating_add(delta);
        *value
    }

    pub fn flag(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.flags.insert(key.to_string(), value);
    }

    pub fn track(&self, track: &str) -> TrackProgress {
        self.progression.tracks.get(track).copied().unwrap_or_default()
    }

    pub fn track_mut(&mut self, track: &str) -> &mut TrackProgress {
        self.progression.tracks.entry(track.to_string()).or_default()
    }

    pub fn cooldown(&self, key: &str) -> Option<TimestampMs> {
        self.cooldowns.get(key).copied()
    }

    pub fn set_cooldown(&mut self, key: &str, until: TimestampMs) {
        self.cooldowns.insert(key.to_string(), until);
    }

    /// Whether the cooldown stored under `key` has elapsed at `now`.
    pub fn cooldown_ready(&self, key: &str, now: TimestampMs) -> bool {
        self.cooldown(key).is_none_or(|until| until <= now)
    }
}
