//! cairn CLI entrypoint.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod config;
mod handlers;

use commands::{CacheCommands, Commands, ConfigCommands};
use config::CairnConfig;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(author, version, about = "Content-addressed build cache", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let config = CairnConfig::load(config_path)?;

    let mut tracing_config = config.tracing.clone();
    if cli.json_logs {
        tracing_config = tracing_config.with_format(cairn_trace::LogFormat::Json);
    }
    cairn_trace::init_tracing(&tracing_config)?;
    debug!(config = ?config_path, "Configuration loaded");

    match cli.command {
        Commands::Serve { listen, directory } => handlers::serve(&config, listen, directory).await?,
        Commands::Cache { command } => match command {
            CacheCommands::Stats => handlers::cache_stats(&config).await?,
            CacheCommands::Evict {
                max_size_bytes,
                older_than_days,
            } => handlers::evict_cache(&config, max_size_bytes, older_than_days).await?,
            CacheCommands::Clear => handlers::clear_cache(&config).await?,
        },
        Commands::Fingerprint {
            kind,
            version,
            inputs,
            values,
            outputs,
            lookup,
        } => handlers::fingerprint(&config, &kind, &version, &inputs, &values, &outputs, lookup)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config, config_path)?,
            ConfigCommands::Set { key, value } => handlers::set_config(config_path, &key, &value)?,
        },
    }

    Ok(())
}
