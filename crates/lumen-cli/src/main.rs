//! Lumen operator CLI
//!
//! Works on the persisted session layout written by the Lumen backend:
//! inspect state documents, take and restore backups, record type
//! migrations and report memory statistics.

mod args;
mod commands;
mod router;

use anyhow::Result;
use args::{Cli, Commands, ConfigAction};
use clap::Parser;
use lumen_core::config::load_config;
use lumen_core::{LogFormat, LoggingConfig, LumenConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config init` must work even when the existing file is broken
    let config = match &cli.command {
        Commands::Config {
            action: ConfigAction::Init { .. },
        } => LumenConfig::default(),
        _ => load_config(cli.config.as_deref())?,
    };

    init_logging(&config.logging, cli.verbose);
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    router::route(cli, config).await
}

/// Install the global subscriber; `RUST_LOG` takes precedence over config
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
