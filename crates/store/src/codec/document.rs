//! On-disk document shape and its conversion to and from [`Record`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{Economy, IdempotencySet, Progression, Record, RecordPolicy, TrackProgress};
use crate::types::{SchemaVersion, TimestampMs};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RecordDocument {
    #[serde(deserialize_with = "lenient::version")]
    pub schema_version: SchemaVersion,
    #[serde(deserialize_with = "lenient::object")]
    pub economy: EconomyDocument,
    #[serde(deserialize_with = "lenient::object")]
    pub progression: ProgressionDocument,
    #[serde(deserialize_with = "lenient::flag_map")]
    pub flags: BTreeMap<String, bool>,
    #[serde(deserialize_with = "lenient::int_map")]
    pub cooldowns: BTreeMap<String, TimestampMs>,
    #[serde(deserialize_with = "lenient::int_map")]
    pub counters: BTreeMap<String, i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct EconomyDocument {
    #[serde(deserialize_with = "lenient::int")]
    pub balance: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub lifetime_earned: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub lifetime_spent: i64,
    /// Oldest first
    #[serde(deserialize_with = "lenient::string_list")]
    pub recent_transactions: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ProgressionDocument {
    #[serde(deserialize_with = "lenient::track_map")]
    pub tracks: BTreeMap<String, TrackDocument>,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct TrackDocument {
    #[serde(deserialize_with = "lenient::int")]
    pub level: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub experience: i64,
}

impl RecordDocument {
    pub fn from_record(record: &Record) -> Self {
        Self {
            schema_version: record.schema_version,
            economy: EconomyDocument {
                balance: record.economy.balance,
                lifetime_earned: record.economy.lifetime_earned,
                lifetime_spent: record.economy.lifetime_spent,
                recent_transactions: record.economy.recent_transactions.to_vec(),
            },
            progression: ProgressionDocument {
                tracks: record
                    .progression
                    .tracks
                    .iter()
                    .map(|(name, progress)| {
                        (
                            name.clone(),
                            TrackDocument {
                                level: progress.level,
                                experience: progress.experience,
                            },
                        )
                    })
                    .collect(),
            },
            flags: record.flags.clone(),
            cooldowns: record.cooldowns.clone(),
            counters: record.counters.clone(),
        }
    }

    pub fn into_record(self, policy: &RecordPolicy) -> Record {
        Record {
            schema_version: self.schema_version,
            economy: Economy {
                balance: self.economy.balance,
                lifetime_earned: self.economy.lifetime_earned,
                lifetime_spent: self.economy.lifetime_spent,
                recent_transactions: IdempotencySet::from_ids(
                    policy.idempotency_capacity,
                    self.economy.recent_transactions,
                ),
            },
            progression: Progression {
                tracks: self
                    .progression
                    .tracks
                    .into_iter()
                    .map(|(name, track)| {
                        (
                            name,
                            TrackProgress {
                                level: track.level,
                                experience: track.experience,
                            },
                        )
                    })
                    .collect(),
            },
            flags: self.flags,
            cooldowns: self.cooldowns,
            counters: self.counters,
        }
    }
}

/// Deserializers that fall back to typed defaults instead of failing.
///
/// Only a document that is not a JSON object at all is rejected; every field
/// inside it decodes to something.
mod lenient {
    use std::collections::BTreeMap;

    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::TrackDocument;
    use crate::types::SchemaVersion;

    pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(as_int(&Value::deserialize(deserializer)?))
    }

    pub fn version<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<SchemaVersion, D::Error> {
        let raw = as_int(&Value::deserialize(deserializer)?);
        Ok(SchemaVersion::try_from(raw.max(0)).unwrap_or(SchemaVersion::MAX))
    }

    pub fn object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_object() {
            Ok(serde_json::from_value(value).unwrap_or_default())
        } else {
            Ok(T::default())
        }
    }

    pub fn int_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, i64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), as_int(v))).collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn flag_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, bool>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), as_flag(v))).collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn track_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, TrackDocument>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => map
                .into_iter()
                .map(|(name, value)| {
                    let track = if value.is_object() {
                        serde_json::from_value(value).unwrap_or_default()
                    } else {
                        TrackDocument::default()
                    };
                    (name, track)
                })
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn string_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    fn as_int(value: &Value) -> i64 {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn as_flag(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            ),
            _ => false,
        }
    }
}
