//! Record codec: JSON documents in, bounded and migrated records out.
//!
//! Decoding is tolerant of missing and unknown fields but refuses documents
//! that carry no data at all, so a truncated or zeroed file surfaces as
//! [`DecodeError::Corrupt`] and goes through recovery instead of silently
//! turning into a default record.

mod document;
mod migration;

pub use migration::{
    CURRENT_SCHEMA_VERSION, Document, LEGACY_SCHEMA_VERSION, LEGACY_TRACK, MigrationOutcome,
    MigrationStep, MigrationTable, v1_to_v2,
};

use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::record::{Record, RecordPolicy};

use document::RecordDocument;

/// A decoded record together with how its schema version was handled.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub record: Record,
    pub migration: MigrationOutcome,
}

/// Serializes records to JSON documents and back.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    policy: RecordPolicy,
    migrations: MigrationTable,
}

impl RecordCodec {
    pub fn new(policy: RecordPolicy) -> Self {
        Self {
            policy,
            migrations: MigrationTable::standard(),
        }
    }

    pub fn with_migrations(mut self, migrations: MigrationTable) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn policy(&self) -> &RecordPolicy {
        &self.policy
    }

    pub fn current_version(&self) -> u32 {
        self.migrations.current_version()
    }

    /// A record for an entity that has never been stored.
    pub fn fresh_record(&self) -> Record {
        let mut record = Record::fresh(&self.policy);
        record.schema_version = self.migrations.current_version();
        record
    }

    pub fn decode(&self, bytes: &[u8]) -> std::result::Result<Decoded, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Corrupt("document is empty".into()));
        }

        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| DecodeError::Corrupt(format!("unparsable document: {e}")))?;

        let Value::Object(mut doc) = value else {
            return Err(DecodeError::Corrupt("document is not an object".into()));
        };
        if doc.is_empty() {
            return Err(DecodeError::Corrupt("document has no fields".into()));
        }

        let migration = self.migrations.apply(&mut doc);

        let document: RecordDocument = serde_json::from_value(Value::Object(doc))
            .map_err(|e| DecodeError::Corrupt(format!("malformed document: {e}")))?;

        let mut record = document.into_record(&self.policy);
        record.clamp(&self.policy.bounds);

        Ok(Decoded { record, migration })
    }

    /// Encode a record. The stored version tag is never lowered, so a record
    /// loaded from a newer build is written back with its own version.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut document = RecordDocument::from_record(record);
        document.schema_version = document
            .schema_version
            .max(self.migrations.current_version());
        Ok(serde_json::to_vec_pretty(&document)?)
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(RecordPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldBounds, TrackProgress};
    use serde_json::json;

    fn codec() -> RecordCodec {
        RecordCodec::new(
            RecordPolicy::default()
                .with_starting_balance(50)
                .with_idempotency_capacity(4)
                .with_bounds(FieldBounds::default().with_level_cap("mining", 30)),
        )
    }

    fn sample_record(codec: &RecordCodec) -> Record {
        let mut record = codec.fresh_record();
        record.economy.balance = 1_250;
        record.economy.lifetime_earned = 9_000;
        record.economy.lifetime_spent = 7_750;
        for tx in ["tx-1", "tx-2", "tx-3"] {
            record.economy.recent_transactions.insert(tx);
        }
        *record.track_mut("mining") = TrackProgress {
            level: 12,
            experience: 3_400,
        };
        record.set_flag("pvp", true);
        record.set_flag("hideScoreboard", false);
        record.set_cooldown("dailyReward", 1_700_000_000_000);
        record.add_counter("blocksBroken", 42);
        record
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let codec = codec();
        let record = sample_record(&codec);

        let bytes = codec.encode(&record).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        assert_eq!(decoded.record, record);
        assert_eq!(decoded.migration, MigrationOutcome::UpToDate);
    }

    #[test]
    fn empty_and_unparsable_documents_are_corrupt() {
        let codec = codec();
        for bytes in [
            &b""[..],
            b"   \n",
            b"{\"economy\": {\"bal",
            b"[1, 2, 3]",
            b"null",
            b"{}",
            b"\x00\x00\x00\x00",
        ] {
            assert!(
                matches!(codec.decode(bytes), Err(DecodeError::Corrupt(_))),
                "{:?} should be corrupt",
                String::from_utf8_lossy(bytes)
            );
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults_and_unknown_fields_are_ignored() {
        let codec = codec();
        let bytes = serde_json::to_vec(&json!({
            "schemaVersion": 2,
            "economy": { "balance": 10 },
            "guild": { "name": "ignored" }
        }))
        .unwrap();

        let record = codec.decode(&bytes).unwrap().record;

        assert_eq!(record.economy.balance, 10);
        assert_eq!(record.economy.lifetime_earned, 0);
        assert!(record.economy.recent_transactions.is_empty());
        assert!(record.flags.is_empty());
        assert!(record.progression.tracks.is_empty());
    }

    #[test]
    fn numeric_fields_are_read_leniently_and_clamped() {
        let codec = codec();
        let bytes = serde_json::to_vec(&json!({
            "schemaVersion": 2,
            "economy": { "balance": "75", "lifetimeEarned": 12.9, "lifetimeSpent": -4 },
            "progression": { "tracks": { "mining": { "level": 99, "experience": "x" } } },
            "flags": { "pvp": "yes", "fly": 0 },
            "counters": { "kills": -3, "deaths": 2 },
            "cooldowns": "not a map"
        }))
        .unwrap();

        let record = codec.decode(&bytes).unwrap().record;

        assert_eq!(record.economy.balance, 75);
        assert_eq!(record.economy.lifetime_earned, 12);
        assert_eq!(record.economy.lifetime_spent, 0);
        assert_eq!(record.track("mining").level, 30);
        assert_eq!(record.track("mining").experience, 0);
        assert!(record.flag("pvp"));
        assert!(!record.flag("fly"));
        assert_eq!(record.counter("kills"), 0);
        assert_eq!(record.counter("deaths"), 2);
        assert!(record.cooldowns.is_empty());
    }

    #[test]
    fn legacy_money_field_migrates_to_balance() {
        let codec = codec();
        let bytes = br#"{ "schemaVersion": 1, "money": 100 }"#;

        let decoded = codec.decode(bytes).unwrap();

        assert_eq!(decoded.record.economy.balance, 100);
        assert_eq!(decoded.record.schema_version, 2);
        assert_eq!(decoded.migration, MigrationOutcome::Migrated { from: 1, to: 2 });
    }

    #[test]
    fn future_version_loads_and_is_never_downgraded() {
        let codec = codec();
        let bytes = br#"{ "schemaVersion": 7, "economy": { "balance": 3 }, "newNamespace": {} }"#;

        let decoded = codec.decode(bytes).unwrap();
        assert_eq!(
            decoded.migration,
            MigrationOutcome::Skipped { found: 7, current: 2 }
        );
        assert_eq!(decoded.record.economy.balance, 3);

        let reencoded = codec.encode(&decoded.record).unwrap();
        let value: Value = serde_json::from_slice(&reencoded).unwrap();
        assert_eq!(value["schemaVersion"], json!(7));
    }

    #[test]
    fn recent_transactions_keep_only_the_configured_capacity() {
        let codec = codec();
        let bytes = serde_json::to_vec(&json!({
            "schemaVersion": 2,
            "economy": { "recentTransactions": ["a", "b", "c", "d", "e", "f"] }
        }))
        .unwrap();

        let record = codec.decode(&bytes).unwrap().record;
        assert_eq!(
            record.economy.recent_transactions.to_vec(),
            vec!["c", "d", "e", "f"]
        );
    }
}
