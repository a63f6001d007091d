use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use record_store::{Record, RecordStore};

use super::parse_id;

/// Print a record
#[derive(Parser)]
pub struct Show {
    /// Record id
    #[arg(value_name = "ID")]
    id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// Balances, tracks, flags and counters
    Summary,
    /// The stored JSON document
    Json,
}

impl Show {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        let id = parse_id(&self.id)?;
        let handle = store.handle();
        let record = handle.read_record(&id).await?;

        match self.format {
            OutputFormat::Summary => print_summary(&id.to_string(), &record),
            OutputFormat::Json => {
                let bytes = handle.codec().encode(&record)?;
                let text = String::from_utf8(bytes).context("Encoded record is not UTF-8")?;
                println!("{text}");
            }
        }
        Ok(())
    }
}

fn print_summary(id: &str, record: &Record) {
    println!(
        "{} {} (schema v{})",
        style("Record").bold(),
        style(id).cyan(),
        record.schema_version
    );

    println!("\n{}", style("Economy").bold());
    println!("  balance:          {}", record.economy.balance);
    println!("  lifetime earned:  {}", record.economy.lifetime_earned);
    println!("  lifetime spent:   {}", record.economy.lifetime_spent);
    println!(
        "  recent tx ids:    {}/{}",
        record.economy.recent_transactions.len(),
        record.economy.recent_transactions.capacity()
    );

    if !record.progression.tracks.is_empty() {
        println!("\n{}", style("Progression").bold());
        for (track, progress) in &record.progression.tracks {
            println!(
                "  {:<16} level {:>3}  xp {}",
                track, progress.level, progress.experience
            );
        }
    }

    if !record.flags.is_empty() {
        println!("\n{}", style("Flags").bold());
        for (key, value) in &record.flags {
            println!("  {key:<16} {value}");
        }
    }

    if !record.cooldowns.is_empty() {
        println!("\n{}", style("Cooldowns").bold());
        for (key, until) in &record.cooldowns {
            println!("  {key:<16} {until}");
        }
    }

    if !record.counters.is_empty() {
        println!("\n{}", style("Counters").bold());
        for (key, value) in &record.counters {
            println!("  {key:<16} {value}");
        }
    }
}
