//! Platform-specific directory utilities
//!
//! Provides consistent directory paths across different operating systems,
//! following platform conventions for cache and data directories.

use std::path::PathBuf;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "record-store")
}

/// Get the platform-specific log directory
///
/// - macOS: `~/Library/Caches/record-store/logs`
/// - Linux: `~/.cache/record-store/logs` (or `$XDG_CACHE_HOME/record-store/logs`)
/// - Windows: `%LOCALAPPDATA%\record-store\logs`
/// - Fallback: `/tmp/record-store/logs`
pub fn log_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/record-store"))
        .join("logs")
}

/// Get the platform-specific data directory holding the store root
///
/// - macOS: `~/Library/Application Support/record-store/records`
/// - Linux: `~/.local/share/record-store/records`
/// - Windows: `%APPDATA%\record-store\records`
/// - Fallback: `./records`
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("records"))
        .unwrap_or_else(|| PathBuf::from("./records"))
}
