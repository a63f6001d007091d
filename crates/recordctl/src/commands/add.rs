use anyhow::Result;
use clap::Parser;
use console::style;
use record_store::RecordStore;

use super::parse_id;

/// Add to a record's balance or one of its counters
#[derive(Parser)]
pub struct Add {
    /// Record id
    #[arg(value_name = "ID")]
    id: String,

    /// Amount to add (negative to subtract; results are floored at zero)
    #[arg(value_name = "AMOUNT", allow_hyphen_values = true)]
    amount: i64,

    /// Counter to change instead of the balance
    #[arg(short, long, value_name = "KEY")]
    counter: Option<String>,

    /// Transaction id; a repeated id is ignored
    #[arg(short, long, value_name = "TX")]
    tx: Option<String>,
}

impl Add {
    pub async fn execute(self, store: &RecordStore) -> Result<()> {
        let id = parse_id(&self.id)?;
        let amount = self.amount;
        let counter = self.counter;
        let tx = self.tx;

        let applied = store
            .handle()
            .modify(&id, |record| {
                if let Some(tx) = &tx
                    && !record.economy.recent_transactions.insert(tx.as_str())
                {
                    return None;
                }

                Some(match &counter {
                    Some(key) => record.add_counter(key, amount),
                    None => {
                        record.economy.balance = record.economy.balance.saturating_add(amount);
                        if amount > 0 {
                            record.economy.lifetime_earned =
                                record.economy.lifetime_earned.saturating_add(amount);
                        } else {
                            record.economy.lifetime_spent =
                                record.economy.lifetime_spent.saturating_sub(amount);
                        }
                        record.economy.balance
                    }
                })
            })
            .await?;

        match applied {
            Some(value) => {
                let target = counter.as_deref().unwrap_or("balance");
                println!("{} {} {} = {}", style("✓").green(), id, target, value.max(0));
            }
            None => println!(
                "{} transaction already processed for {}",
                style("!").yellow(),
                id
            ),
        }
        Ok(())
    }
}
