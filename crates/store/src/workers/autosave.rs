use async_trait::async_trait;

use crate::handle::StoreHandle;

use super::{PeriodicTask, TickReport};

/// Persists dirty records on every tick.
pub struct AutosaveTask {
    store: StoreHandle,
}

impl AutosaveTask {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PeriodicTask for AutosaveTask {
    fn name(&self) -> &'static str {
        "Autosave"
    }

    async fn tick(&mut self) -> TickReport {
        let report = self.store.autosave_tick().await;
        TickReport {
            succeeded: report.saved,
            failed: report.failed,
        }
    }
}
