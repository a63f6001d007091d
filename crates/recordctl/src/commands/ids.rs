use anyhow::Result;
use clap::Parser;
use console::style;
use record_store::RecordStore;

/// List every record id on disk
#[derive(Parser)]
pub struct Ids {}

impl Ids {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        let ids = store.handle().list_all_known_ids().await?;

        if ids.is_empty() {
            println!("{}", style("No records found").yellow());
            return Ok(());
        }

        for id in &ids {
            println!("{id}");
        }
        println!("\n{} records", style(ids.len()).bold());
        Ok(())
    }
}
