use std::path::Path;

use anyhow::Result;
use clap::Parser;
use console::style;
use record_store::RecordStore;

/// Report what crash recovery did when the store was opened
#[derive(Parser)]
pub struct Recover {}

impl Recover {
    pub fn execute(self, store: &RecordStore, root: &Path) -> Result<()> {
        let report = store.recovery_report();

        println!("{} {}", style("Recovery scan of").bold(), root.display());

        if report.is_clean() {
            println!("{}", style("Nothing to recover").green());
            return Ok(());
        }

        for (id, action) in &report.actions {
            println!("  {} {:<24} {}", style("•").cyan(), id.as_str(), action);
        }
        for (id, reason) in &report.failures {
            println!("  {} {:<24} {}", style("✗").red(), id.as_str(), reason);
        }
        if report.orphaned_snapshot_temps > 0 {
            println!(
                "  {} removed {} unfinished snapshot files",
                style("•").cyan(),
                report.orphaned_snapshot_temps
            );
        }

        if !report.failures.is_empty() {
            anyhow::bail!("{} records could not be reconciled", report.failures.len());
        }
        Ok(())
    }
}
