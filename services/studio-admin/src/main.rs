//! Studio admin console
//!
//! Command-line front end for the site's admin backend:
//! 1. Loads config (`--config`, then CONFIG_PATH, then ./studio-admin.toml)
//! 2. Rehydrates the stored session from the token file
//! 3. Runs one command through the authenticated client
//! 4. Prints the result on stdout; logs go to stderr

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use studio_client::{ApiClient, FileTokenStorage};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs with LOG_LEVEL / RUST_LOG support, kept off stdout
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command;

    let config_path = Config::resolve_path(cli.config.as_deref());
    debug!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.client.base_url,
        token_file = %config.storage.token_file.display(),
        ?command,
        "configuration loaded"
    );

    let storage = FileTokenStorage::load(config.storage.token_file.clone()).with_context(|| {
        format!(
            "failed to open token file {}",
            config.storage.token_file.display()
        )
    })?;
    let client = ApiClient::new(config.client.clone(), Arc::new(storage))
        .context("failed to build API client")?;

    let output = commands::run(&client, &config, command).await?;
    println!("{output}");
    Ok(())
}
