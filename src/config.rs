// src/config.rs
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::jobs::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Persisted history, relative paths resolve against the start-up directory.
    pub history_file: PathBuf,
    /// In-memory recall size of the line editor.
    pub history_capacity: usize,
    /// Registry capacity.
    pub max_jobs: usize,
    /// Commands evaluated before the first prompt.
    pub rc_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            history_file: PathBuf::from(".nishistory"),
            history_capacity: 1000,
            max_jobs: DEFAULT_CAPACITY,
            rc_file: dirs::home_dir().map(|home| home.join(".nishrc")),
        }
    }
}

impl Config {
    /// `$NISH_CONFIG`, else `<config dir>/nish/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("NISH_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("nish").join("config.toml")))
    }

    pub fn parse(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        anyhow::ensure!(config.max_jobs > 0, "max_jobs must be at least 1");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Config::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load the user's config. A missing file gives the defaults; a broken
    /// one is reported and also gives the defaults.
    pub fn load() -> Config {
        let Some(path) = Config::default_path() else { return Config::default() };
        if !path.exists() {
            return Config::default();
        }
        Config::from_file(&path).unwrap_or_else(|e| {
            warn!("{e:#}");
            eprintln!("nish: warning: {e:#}, using defaults");
            Config::default()
        })
    }
}
