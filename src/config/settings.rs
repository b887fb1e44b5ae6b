use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::util::paths::config_path;

/// Environment variable naming the offload runtime library to load
pub const ENV_RUNTIME_LIB: &str = "KERNEL_REPLAY_RUNTIME_LIB";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime library to load; when set, no other candidate is tried
    pub runtime_library: Option<PathBuf>,
    /// Library names probed in order when no runtime library is configured
    pub runtime_candidates: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_library: None,
            runtime_candidates: vec![
                "libomptarget.so".into(),
                "libomptarget.so.18".into(),
                "libomptarget.so.17".into(),
                "libomptarget.dylib".into(),
            ],
        }
    }
}

/// TOML representation of the runtime section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlRuntimeConfig {
    /// Path of the runtime library
    pub library: Option<PathBuf>,
    /// Replacement candidate list
    pub candidates: Option<Vec<String>>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Runtime configuration
    pub runtime: Option<TomlRuntimeConfig>,
}

impl Config {
    /// Load configuration: defaults, then the config file, then the
    /// environment.
    pub fn load() -> Self {
        let mut config = Config::default();
        config.merge_file(&config_path());
        config.merge_env(std::env::var_os(ENV_RUNTIME_LIB));
        config
    }

    /// Merge a config file on top of the current values.
    ///
    /// A missing file is ignored; an unreadable or malformed one is logged
    /// and ignored.
    pub fn merge_file(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file");
                return;
            }
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => self.merge_toml(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
            }
        }
    }

    fn merge_toml(&mut self, toml_config: TomlConfig) {
        // Load runtime configuration
        if let Some(runtime) = toml_config.runtime {
            if let Some(library) = runtime.library {
                self.runtime_library = Some(library);
            }
            if let Some(candidates) = runtime.candidates {
                self.runtime_candidates = candidates;
            }
        }
    }

    /// Apply the value of [`ENV_RUNTIME_LIB`], if set and non-empty.
    pub fn merge_env(&mut self, runtime_lib: Option<OsString>) {
        if let Some(lib) = runtime_lib.filter(|v| !v.is_empty()) {
            self.runtime_library = Some(PathBuf::from(lib));
        }
    }

    pub fn with_runtime_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_library = Some(path.into());
        self
    }
}
