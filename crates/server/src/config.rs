//! Server configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use yield_lib::DEFAULT_ARTIFACT_DIR;

/// Environment variable prefix, e.g. `YIELD_SERVER_PORT=9000`
pub const ENV_PREFIX: &str = "YIELD_SERVER";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Directory holding the model, column list and manifest
    pub artifact_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from `YIELD_SERVER_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("artifact_dir", DEFAULT_ARTIFACT_DIR)?
            .add_source(source)
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
