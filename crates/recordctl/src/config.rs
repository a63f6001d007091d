//! Store configuration loaded from the environment.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use record_store::{RecordPolicy, StoreConfig};

use crate::dirs;

/// Construct store configuration from process environment variables.
///
/// Commands commit their own changes, so background workers are off unless
/// enabled here.
///
/// Environment variables:
/// - `RECORD_STORE_DIR` - Store root (default: platform data directory)
/// - `ENABLE_AUTOSAVE` - Run the autosave worker (default: false)
/// - `AUTOSAVE_INTERVAL_SECS` - Seconds between autosave passes (default: 60)
/// - `ENABLE_SNAPSHOTS` - Run the snapshot worker (default: false)
/// - `SNAPSHOT_INTERVAL_SECS` - Seconds between snapshot passes (default: 1800)
/// - `MAX_SNAPSHOTS` - Snapshots kept per record (default: 10)
/// - `STARTING_BALANCE` - Balance of newly created records (default: 0)
/// - `IDEMPOTENCY_CAPACITY` - Transaction ids remembered per record (default: 64)
pub fn from_env(data_dir: Option<PathBuf>) -> StoreConfig {
    from_vars(data_dir, |key| env::var(key).ok())
}

fn from_vars(data_dir: Option<PathBuf>, var: impl Fn(&str) -> Option<String>) -> StoreConfig {
    let root_dir = data_dir
        .or_else(|| var("RECORD_STORE_DIR").map(PathBuf::from))
        .unwrap_or_else(dirs::data_dir);

    let mut config = StoreConfig::new(root_dir).without_workers();

    if let Some(enable) = read_env::<bool>(&var, "ENABLE_AUTOSAVE") {
        config.autosave_enabled = enable;
    }
    if let Some(secs) = read_env::<u64>(&var, "AUTOSAVE_INTERVAL_SECS") {
        config.autosave_interval = Duration::from_secs(secs.max(1));
    }

    if let Some(enable) = read_env::<bool>(&var, "ENABLE_SNAPSHOTS") {
        config.snapshot_enabled = enable;
    }
    if let Some(secs) = read_env::<u64>(&var, "SNAPSHOT_INTERVAL_SECS") {
        config.snapshot_interval = Duration::from_secs(secs.max(1));
    }
    if let Some(max) = read_env::<usize>(&var, "MAX_SNAPSHOTS") {
        config = config.with_max_snapshots(max);
    }

    let mut policy = RecordPolicy::default();
    if let Some(balance) = read_env::<i64>(&var, "STARTING_BALANCE") {
        policy = policy.with_starting_balance(balance);
    }
    if let Some(capacity) = read_env::<usize>(&var, "IDEMPOTENCY_CAPACITY") {
        policy = policy.with_idempotency_capacity(capacity);
    }

    config.with_policy(policy)
}

fn read_env<T>(var: impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    var(key)?.parse().ok()
}
