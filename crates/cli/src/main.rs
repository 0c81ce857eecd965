//! Crop yield CLI
//!
//! Trains the yield model from a CSV, runs the example prediction, and
//! inspects the persisted column schema.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{predict, schema, train};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Crop Yield Predictor CLI
#[derive(Parser)]
#[command(name = "crop-yield")]
#[command(author, version, about = "Train and query the Crop Yield Predictor", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the model and save it with its column list
    Train {
        /// Training CSV (can also be set via CROP_YIELD_DATA env var)
        #[arg(long, env = "CROP_YIELD_DATA")]
        data: Option<PathBuf>,

        /// Directory to write the artifacts to
        #[arg(long, env = "CROP_YIELD_MODEL_DIR")]
        output_dir: Option<PathBuf>,

        /// Target column
        #[arg(long, default_value = yield_lib::DEFAULT_TARGET)]
        target: String,

        /// Seed for the train/test split and the regressor
        #[arg(long, default_value_t = yield_lib::training::DEFAULT_SEED)]
        seed: u64,
    },

    /// Predict the yield of the built-in example record
    Predict {
        /// Directory holding the trained artifacts
        #[arg(long, env = "CROP_YIELD_MODEL_DIR")]
        model_dir: Option<PathBuf>,
    },

    /// List the training columns the model expects
    Schema {
        /// Directory holding the trained artifacts
        #[arg(long, env = "CROP_YIELD_MODEL_DIR")]
        model_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::Config::load()?;
    tracing::debug!(?config, "Loaded CLI configuration");

    match cli.command {
        Commands::Train {
            data,
            output_dir,
            target,
            seed,
        } => {
            let data = config.data_path(data);
            let output_dir = config.model_dir(output_dir);
            train::run(&data, &output_dir, &target, seed, cli.format)?;
        }
        Commands::Predict { model_dir } => {
            predict::run(&config.model_dir(model_dir))?;
        }
        Commands::Schema { model_dir } => {
            schema::run(&config.model_dir(model_dir), cli.format)?;
        }
    }

    Ok(())
}
