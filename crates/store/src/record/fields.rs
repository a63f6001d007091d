//! Dotted field paths used by administrative resets.

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

use super::{FieldBounds, IdempotencySet, Record, RecordPolicy};

/// A resettable location inside a record document.
///
/// Paths use the document's namespace names, e.g. `economy.balance`,
/// `progression.mining`, `flags.pvp` or `counters` for the whole namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    Balance,
    LifetimeEarned,
    LifetimeSpent,
    RecentTransactions,
    Progression,
    Track(String),
    Flags,
    Flag(String),
    Cooldowns,
    Cooldown(String),
    Counters,
    Counter(String),
}

impl FieldPath {
    /// Put the addressed field back to its fresh-record value.
    pub fn reset(&self, record: &mut Record, policy: &RecordPolicy) {
        match self {
            FieldPath::Balance => {
                record.economy.balance = FieldBounds::clamp_amount(policy.starting_balance);
            }
            FieldPath::LifetimeEarned => record.economy.lifetime_earned = 0,
            FieldPath::LifetimeSpent => record.economy.lifetime_spent = 0,
            FieldPath::RecentTransactions => {
                record.economy.recent_transactions =
                    IdempotencySet::with_capacity(policy.idempotency_capacity);
            }
            FieldPath::Progression => record.progression.tracks.clear(),
            FieldPath::Track(track) => {
                record.progression.tracks.remove(track);
            }
            FieldPath::Flags => record.flags = policy.default_flags.clone(),
            FieldPath::Flag(key) => match policy.default_flags.get(key) {
                Some(default) => {
                    record.flags.insert(key.clone(), *default);
                }
                None => {
                    record.flags.remove(key);
                }
            },
            FieldPath::Cooldowns => record.cooldowns.clear(),
            FieldPath::Cooldown(key) => {
                record.cooldowns.remove(key);
            }
            FieldPath::Counters => record.counters.clear(),
            FieldPath::Counter(key) => {
                record.counters.remove(key);
            }
        }
    }
}

impl FromStr for FieldPath {
    type Err = StoreError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let unknown = || StoreError::UnknownField(path.to_string());

        let (namespace, key) = match path.split_once('.') {
            Some((namespace, key)) if !key.is_empty() => (namespace, Some(key)),
            Some(_) => return Err(unknown()),
            None => (path, None),
        };

        let field = match (namespace, key) {
            ("economy", Some("balance")) => FieldPath::Balance,
            ("economy", Some("lifetimeEarned")) => FieldPath::LifetimeEarned,
            ("economy", Some("lifetimeSpent")) => FieldPath::LifetimeSpent,
            ("economy", Some("recentTransactions")) => FieldPath::RecentTransactions,
            ("progression", None) => FieldPath::Progression,
            ("progression", Some(track)) => FieldPath::Track(track.to_string()),
            ("flags", None) => FieldPath::Flags,
            ("flags", Some(key)) => FieldPath::Flag(key.to_string()),
            ("cooldowns", None) => FieldPath::Cooldowns,
            ("cooldowns", Some(key)) => FieldPath::Cooldown(key.to_string()),
            ("counters", None) => FieldPath::Counters,
            ("counters", Some(key)) => FieldPath::Counter(key.to_string()),
            _ => return Err(unknown()),
        };

        Ok(field)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Balance => f.write_str("economy.balance"),
            FieldPath::LifetimeEarned => f.write_str("economy.lifetimeEarned"),
            FieldPath::LifetimeSpent => f.write_str("economy.lifetimeSpent"),
            FieldPath::RecentTransactions => f.write_str("economy.recentTransactions"),
            FieldPath::Progression => f.write_str("progression"),
            FieldPath::Track(track) => write!(f, "progression.{track}"),
            FieldPath::Flags => f.write_str("flags"),
            FieldPath::Flag(key) => write!(f, "flags.{key}"),
            FieldPath::Cooldowns => f.write_str("cooldowns"),
            FieldPath::Cooldown(key) => write!(f, "cooldowns.{key}"),
            FieldPath::Counters => f.write_str("counters"),
            FieldPath::Counter(key) => write!(f, "counters.{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_paths() {
        assert_eq!("economy.balance".parse::<FieldPath>().unwrap(), FieldPath::Balance);
        assert_eq!(
            "progression.mining".parse::<FieldPath>().unwrap(),
            FieldPath::Track("mining".into())
        );
        assert_eq!("counters".parse::<FieldPath>().unwrap(), FieldPath::Counters);
        assert_eq!(
            "flags.pvp".parse::<FieldPath>().unwrap().to_string(),
            "flags.pvp"
        );
    }

    #[test]
    fn rejects_unknown_paths() {
        for raw in ["economy", "economy.", "wallet.balance", "economy.money", ""] {
            assert!(
                matches!(raw.parse::<FieldPath>(), Err(StoreError::UnknownField(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn reset_restores_policy_defaults() {
        let policy = RecordPolicy::default()
            .with_starting_balance(100)
            .with_default_flag("pvp", true);
        let mut record = Record::fresh(&policy);
        record.economy.balance = 5;
        record.set_flag("pvp", false);
        record.set_flag("fly", true);
        record.add_counter("kills", 3);

        FieldPath::Balance.reset(&mut record, &policy);
        FieldPath::Flag("pvp".into()).reset(&mut record, &policy);
        FieldPath::Flag("fly".into()).reset(&mut record, &policy);
        FieldPath::Counter("kills".into()).reset(&mut record, &policy);

        assert_eq!(record.economy.balance, 100);
        assert!(record.flag("pvp"));
        assert!(!record.flags.contains_key("fly"));
        assert_eq!(record.counter("kills"), 0);
    }
}
