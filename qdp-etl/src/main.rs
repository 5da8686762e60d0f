//! Survey ETL (qdp-etl) - Main entry point
//!
//! Exports survey responses from the survey platform, extracts choice
//! mappings from survey definitions, and loads both into the reporting
//! database.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use qdp_common::config::{resolve_config_path, EtlConfig};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qdp_etl::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    // Environment file first so its values feed configuration
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut config = EtlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);

    // Logs on stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting qdp-etl v{}", env!("CARGO_PKG_VERSION"));
    match resolve_config_path(args.config.as_deref()) {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file found, using defaults and environment"),
    }
    debug!(?config, "Resolved configuration");

    cli::execute(&args.command, &config).await
}
