//! Command implementations for recordctl
//!
//! Each command is a separate module that implements its own CLI args and execution logic.

mod add;
mod ids;
mod recover;
mod reset;
mod show;
mod snapshot;

pub use add::Add;
pub use ids::Ids;
pub use recover::Recover;
pub use reset::{ResetAll, ResetField};
pub use show::Show;
pub use snapshot::{Restore, Snapshot, Snapshots};

use anyhow::{Context, Result};
use record_store::EntityId;

pub(crate) fn parse_id(raw: &str) -> Result<EntityId> {
    EntityId::parse(raw).with_context(|| format!("Invalid record id: {raw}"))
}
