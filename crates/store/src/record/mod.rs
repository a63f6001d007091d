//! Record model: the durable per-entity state and the rules that bound it.

mod fields;
mod idempotency;
mod model;
mod policy;

pub use fields::FieldPath;
pub use idempotency::IdempotencySet;
pub use model::{Economy, Progression, Record, TrackProgress};
pub use policy::{FieldBounds, RecordPolicy};
