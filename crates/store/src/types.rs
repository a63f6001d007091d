//! Common types used throughout the record store.
//!
//! The aliases give semantic names to primitives that carry a specific
//! meaning across modules; [`EntityId`] is the validated key every record is
//! stored under.

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Schema version tag carried by every record document
pub type SchemaVersion = u32;

/// Unix timestamp in milliseconds
pub type TimestampMs = i64;

/// Identifier of a processed transaction (idempotency key)
pub type TransactionId = String;

/// Longest identifier accepted as a file stem.
pub const MAX_ENTITY_ID_LEN: usize = 64;

/// Stable identifier a record is stored under.
///
/// Identifiers become file names, so only ASCII alphanumerics, `-` and `_`
/// are accepted. UUIDs in their hyphenated form fit this alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Validate and wrap a raw identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, StoreError> {
        let raw = raw.into();

        let valid = !raw.is_empty()
            && raw.len() <= MAX_ENTITY_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if valid {
            Ok(Self(raw))
        } else {
            Err(StoreError::InvalidEntityId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid_shaped_ids() {
        let id = EntityId::parse("3f2b8c1e-9a4d-4c1b-8e2f-0a1b2c3d4e5f").unwrap();
        assert_eq!(id.as_str(), "3f2b8c1e-9a4d-4c1b-8e2f-0a1b2c3d4e5f");
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn rejects_ids_that_could_escape_the_store() {
        for raw in ["", "../etc", "a/b", "a\\b", "x.rec", "with space", "p1~tmp"] {
            assert!(EntityId::parse(raw).is_err(), "{raw:?} should be rejected");
        }

        let too_long = "a".repeat(MAX_ENTITY_ID_LEN + 1);
        assert!(EntityId::parse(too_long).is_err());
    }
}
