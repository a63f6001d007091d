use async_trait::async_trait;

use crate::handle::StoreHandle;

use super::{PeriodicTask, TickReport};

/// Snapshots every cached record on every tick.
pub struct SnapshotTask {
    store: StoreHandle,
}

impl SnapshotTask {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PeriodicTask for SnapshotTask {
    fn name(&self) -> &'static str {
        "Snapshot"
    }

    async fn tick(&mut self) -> TickReport {
        let report = self.store.snapshot_live_records().await;
        if report.written > 0 {
            tracing::info!("Snapshot pass wrote {} snapshots", report.written);
        }
        TickReport {
            succeeded: report.written,
            failed: report.failed,
        }
    }
}
