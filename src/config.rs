// src/config.rs

//! Configuration loading and derived data paths.
//!
//! Configuration is a small TOML file; every field is optional and falls
//! back to a built-in default, so a missing config file is not an error.
//!
//! ```toml
//! data_dir = "/var/lib/cronrun"
//! max_results = 50
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::Result;

/// Default cap for the in-memory result cache.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Raw, straight-from-TOML form of the config. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub data_dir: Option<PathBuf>,
    pub max_results: Option<usize>,
}

/// Resolved configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for all durable state.
    pub data_dir: PathBuf,
    /// Maximum number of command results kept in memory.
    pub max_results: usize,
}

impl Config {
    /// Directory holding per-command run records.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logdata")
    }

    /// Directory holding the persisted schedule list.
    pub fn schedule_dir(&self) -> PathBuf {
        self.data_dir.join("scheduledata")
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
            max_results: raw.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cronrun")
}

/// Load a configuration file from a given path.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let raw: RawConfig = toml::from_str(&contents)?;
    Ok(raw.into())
}

/// Load a configuration file if a path was given, otherwise use defaults.
pub fn load_or_default(path: Option<&str>) -> Result<Config> {
    match path {
        Some(p) => load_from_path(p),
        None => Ok(RawConfig::default().into()),
    }
}
