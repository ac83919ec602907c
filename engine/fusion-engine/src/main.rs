//! # Fusion Engine Binary
//!
//! Command-line entry point for aggregating, scoring and resolving players.

use anyhow::{Context, Result};
use clap::Parser;
use fusion_engine::cli::{Cli, CliHandler};
use fusion_engine::logging::initialize_logging;
use fusion_engine::FusionConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = FusionConfig::load(cli.config.as_deref()).context("Failed to load fusion configuration")?;

    // Initialize logging
    initialize_logging(&config.logging)?;
    info!(sources = config.sources.len(), "Starting fusion engine");

    // Create CLI handler
    let handler = CliHandler::new(config).await?;

    // Handle command
    handler.handle_command(cli.command).await?;

    Ok(())
}
