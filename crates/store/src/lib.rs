//! Durable per-entity record store.
//!
//! Records live in memory while owned and are persisted as JSON documents
//! with crash-safe commits, schema migrations and timestamped snapshots.
//!
//! Modules:
//! - [`record`]: the record model, field bounds and idempotency set
//! - [`codec`]: JSON encoding with forward-only migrations
//! - [`repository`]: file layout, atomic commits, recovery and snapshots
//! - [`workers`]: autosave and snapshot schedulers
//!
//! Entry point is [`RecordStore`]; consumers work through [`StoreHandle`]
//! and [`RecordHandle`].
pub mod codec;
pub mod config;
pub mod error;
pub mod integration;
pub mod record;
pub mod repository;
pub mod types;
pub mod workers;

mod cache;
mod handle;
mod load;
mod store;

pub use cache::RecordHandle;
pub use codec::{CURRENT_SCHEMA_VERSION, Decoded, MigrationOutcome, MigrationTable, RecordCodec};
pub use config::StoreConfig;
pub use error::{DecodeError, Result, StoreError};
pub use handle::{AutosaveReport, SnapshotReport, StoreHandle};
pub use integration::{ExternalStash, MemoryStash, StashHandle, StashedPayload};
pub use record::{
    Economy, FieldBounds, FieldPath, IdempotencySet, Progression, Record, RecordPolicy,
    TrackProgress,
};
pub use repository::{RecoveryAction, RecoveryReport, SnapshotInfo};
pub use store::{RecordStore, RecordStoreBuilder};
pub use types::{EntityId, SchemaVersion, TimestampMs, TransactionId};
pub use workers::TickReport;
