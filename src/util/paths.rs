//! Path utilities for manifests and configuration

use std::path::{Path, PathBuf};

/// Name of the per-user configuration directory
const APP_DIRNAME: &str = "kernel-replay";

/// Directory that a manifest's relative references resolve against.
///
/// A bare file name resolves against the current directory.
pub fn replay_directory(manifest: &Path) -> PathBuf {
    match manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Get the configuration directory (~/.config/kernel-replay on Linux)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIRNAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIRNAME))
}

/// Get the config file path (~/.config/kernel-replay/config.toml)
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
