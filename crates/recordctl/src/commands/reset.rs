use anyhow::Result;
use clap::Parser;
use console::style;
use record_store::RecordStore;

use super::parse_id;

/// Reset one field of a record to its default
#[derive(Parser)]
pub struct ResetField {
    /// Record id
    #[arg(value_name = "ID")]
    id: String,

    /// Field path, e.g. `economy.balance`, `progression.mining`, `counters`
    #[arg(value_name = "PATH")]
    path: String,
}

impl ResetField {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        let id = parse_id(&self.id)?;
        store.handle().reset_field(&id, &self.path).await?;

        println!("{} reset {} of {}", style("✓").green(), self.path, id);
        Ok(())
    }
}

/// Snapshot every record, then replace it with a fresh one
#[derive(Parser)]
pub struct ResetAll {
    /// Required to confirm the reset
    #[arg(long)]
    yes: bool,
}

impl ResetAll {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        if !self.yes {
            anyhow::bail!("Refusing to reset every record without --yes");
        }

        let count = store.handle().reset_all().await?;
        println!(
            "{} reset {} records (previous state kept as snapshots)",
            style("✓").green(),
            count
        );
        Ok(())
    }
}
