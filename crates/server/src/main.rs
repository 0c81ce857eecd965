//! Crop yield prediction server
//!
//! Loads the trained model and its column list once at startup, then serves
//! the interactive prediction form alongside a JSON API.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use yield_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    YieldPredictor,
};
use yield_server::{api, config::ServerConfig};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // JSON output, filtered through RUST_LOG
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting yield-server");

    let config = ServerConfig::load().context("Failed to load server configuration")?;
    info!(
        addr = %config.addr(),
        artifact_dir = %config.artifact_dir.display(),
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    let logger = StructuredLogger::new("yield-server");

    let predictor = YieldPredictor::load(&config.artifact_dir).with_context(|| {
        format!(
            "Failed to load model artifacts from {}",
            config.artifact_dir.display()
        )
    })?;
    info!(
        model_version = %predictor.model_version(),
        columns = predictor.schema().n_columns(),
        component = components::MODEL,
        "Model ready"
    );
    health_registry
        .set_model_loaded(predictor.model_version())
        .await;
    logger.log_startup(SERVER_VERSION, predictor.model_version());

    let state = Arc::new(api::AppState::new(Arc::new(predictor), health_registry));

    let shutdown_logger = logger.clone();
    api::serve(&config.addr(), state, async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_logger.log_shutdown("SIGINT received");
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
