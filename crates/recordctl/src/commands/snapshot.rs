use anyhow::Result;
use clap::Parser;
use console::style;
use record_store::RecordStore;

use super::parse_id;

/// Take a snapshot of a record
#[derive(Parser)]
pub struct Snapshot {
    /// Record id
    #[arg(value_name = "ID")]
    id: String,
}

impl Snapshot {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        let id = parse_id(&self.id)?;
        let info = store.handle().create_snapshot(&id).await?;

        println!(
            "{} snapshot {} ({} bytes)",
            style("✓").green(),
            style(info.timestamp()).cyan(),
            info.size_bytes
        );
        Ok(())
    }
}

/// List a record's snapshots, newest first
#[derive(Parser)]
pub struct Snapshots {
    /// Record id
    #[arg(value_name = "ID")]
    id: String,
}

impl Snapshots {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        let id = parse_id(&self.id)?;
        let snapshots = store.handle().list_snapshots(&id).await?;

        if snapshots.is_empty() {
            println!("{}", style(format!("No snapshots for {id}")).yellow());
            return Ok(());
        }

        for info in &snapshots {
            println!("{}  {:>8} bytes", info.timestamp(), info.size_bytes);
        }
        Ok(())
    }
}

/// Restore a record from a snapshot
#[derive(Parser)]
pub struct Restore {
    /// Record id
    #[arg(value_name = "ID")]
    id: String,

    /// Snapshot timestamp as printed by `snapshots`; newest when omitted
    #[arg(value_name = "TIMESTAMP")]
    timestamp: Option<String>,
}

impl Restore {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        let id = parse_id(&self.id)?;
        let handle = store.handle();

        let timestamp = match self.timestamp {
            Some(timestamp) => timestamp,
            None => match handle.list_snapshots(&id).await?.first() {
                Some(newest) => newest.timestamp(),
                None => anyhow::bail!("No snapshots found for {id}"),
            },
        };

        let record = handle.restore_snapshot(&id, &timestamp).await?;
        println!(
            "{} {} restored to {} (balance {})",
            style("✓").green(),
            id,
            style(&timestamp).cyan(),
            record.economy.balance
        );
        Ok(())
    }
}
