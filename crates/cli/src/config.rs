//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use yield_lib::DEFAULT_ARTIFACT_DIR;

/// Dataset used when neither the flag, the env var nor the config file names one
pub const DEFAULT_DATA_PATH: &str = "crop_yield.csv";

/// CLI configuration, read from `~/.config/crop-yield/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default training CSV
    pub data_path: Option<PathBuf>,
    /// Default artifact directory
    pub model_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let content =
                    std::fs::read_to_string(&path).context("Failed to read config file")?;
                serde_json::from_str(&content).context("Failed to parse config file")
            }
            _ => Ok(Self::default()),
        }
    }

    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("crop-yield").join("config.json"))
    }

    /// Flag or env value first, then the config file, then the default
    pub fn data_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.data_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH))
    }

    pub fn model_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.model_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR))
    }
}
