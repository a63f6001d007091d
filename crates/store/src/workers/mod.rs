//! Background workers that persist and snapshot live records.
//!
//! Both workers share one loop: wake on an interval or on a command, run a
//! [`PeriodicTask`], and stop on [`Command::Shutdown`].

mod autosave;
mod snapshot;

pub use autosave::AutosaveTask;
pub use snapshot::SnapshotTask;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Summary of one task run, for logs and callers of [`WorkerHandle::run_now`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Unit of periodic work.
#[async_trait]
pub trait PeriodicTask: Send + 'static {
    fn name(&self) -> &'static str;

    async fn tick(&mut self) -> TickReport;
}

/// Commands that can be sent to a periodic worker
pub enum Command {
    /// Run the task immediately, outside the schedule
    RunNow { reply: oneshot::Sender<TickReport> },

    /// Shutdown the worker gracefully
    Shutdown,
}

/// Runs a [`PeriodicTask`] on a fixed interval.
pub struct PeriodicWorker<T: PeriodicTask> {
    task: T,
    interval: Duration,
    command_rx: mpsc::Receiver<Command>,
}

impl<T: PeriodicTask> PeriodicWorker<T> {
    pub fn new(task: T, interval: Duration, command_rx: mpsc::Receiver<Command>) -> Self {
        Self {
            task,
            interval,
            command_rx,
        }
    }

    /// Spawn the worker, returning a handle that can trigger or stop it.
    pub fn spawn(task: T, interval: Duration, command_buffer_size: usize) -> WorkerHandle {
        let name = task.name();
        let (command_tx, command_rx) = mpsc::channel(command_buffer_size.max(1));
        let worker = Self::new(task, interval, command_rx);

        let join = tokio::spawn(async move {
            worker.run().await;
        });

        WorkerHandle {
            name,
            command_tx,
            join,
        }
    }

    /// Main worker loop
    pub async fn run(mut self) {
        let name = self.task.name();
        info!("{} worker started (interval: {:?})", name, self.interval);

        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.task.tick().await;
                    if report.failed > 0 {
                        debug!("{} tick: {} ok, {} failed", name, report.succeeded, report.failed);
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(Command::RunNow { reply }) => {
                            let report = self.task.tick().await;
                            let _ = reply.send(report);
                        }
                        Some(Command::Shutdown) => {
                            info!("{} worker shutdown command received", name);
                            break;
                        }
                        None => {
                            debug!("{} worker command channel closed", name);
                            break;
                        }
                    }
                }
            }
        }

        info!("{} worker stopped", name);
    }
}

/// Handle to a spawned [`PeriodicWorker`].
pub struct WorkerHandle {
    name: &'static str,
    command_tx: mpsc::Sender<Command>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the task now and wait for its report.
    pub async fn run_now(&self) -> Result<TickReport> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::RunNow { reply: reply_tx })
            .await
            .map_err(|_| StoreError::CommandChannelClosed)?;

        reply_rx.await.map_err(StoreError::ReplyChannelClosed)
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        // A closed channel means the worker already exited.
        let _ = self.command_tx.send(Command::Shutdown).await;
        self.join.await.map_err(StoreError::TaskJoin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PeriodicTask for CountingTask {
        fn name(&self) -> &'static str {
            "Counting"
        }

        async fn tick(&mut self) -> TickReport {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            TickReport {
                succeeded: runs,
                failed: 0,
            }
        }
    }

    #[tokio::test]
    async fn run_now_and_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = PeriodicWorker::spawn(
            CountingTask {
                runs: Arc::clone(&runs),
            },
            Duration::from_secs(3600),
            4,
        );

        assert_eq!(handle.run_now().await.unwrap().succeeded, 1);
        assert_eq!(handle.run_now().await.unwrap().succeeded, 2);

        handle.shutdown().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ticks_on_interval() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = PeriodicWorker::spawn(
            CountingTask {
                runs: Arc::clone(&runs),
            },
            Duration::from_millis(20),
            4,
        );

        time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await.unwrap();

        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
