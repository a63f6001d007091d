//! Error types surfaced by the record store.
//!
//! [`DecodeError`] is kept separate from [`StoreError`] so load paths can
//! tell a corrupt document apart from an I/O failure and route it into
//! recovery instead of accepting a zeroed record.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::types::EntityId;

/// Failures while turning document bytes into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("corrupt record document: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid entity id {0:?}")]
    InvalidEntityId(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to commit record {entity}: {source}")]
    WriteFailed {
        entity: EntityId,
        #[source]
        source: std::io::Error,
    },

    #[error("record {0} is not loaded")]
    NotLoaded(EntityId),

    #[error("record {0} was released and evicted from the cache")]
    Evicted(EntityId),

    #[error("snapshot {timestamp} not found for record {entity}")]
    SnapshotNotFound { entity: EntityId, timestamp: String },

    #[error("unknown record field path {0:?}")]
    UnknownField(String),

    #[error("record store lock was poisoned")]
    LockPoisoned,

    #[error("no external stash is installed")]
    StashUnavailable,

    #[error("external stash failed: {0}")]
    Stash(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking store task failed")]
    TaskJoin(#[source] tokio::task::JoinError),

    #[error("worker command channel closed")]
    CommandChannelClosed,

    #[error("worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
