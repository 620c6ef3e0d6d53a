//! Command handlers.

use crate::config::CairnConfig;
use anyhow::{Context, Result, bail};
use cairn_cache::Fingerprinter;
use cairn_core::TaskIdentity;
use cairn_server::CacheServer;
use cairn_store::LocalStore;
use console::style;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run the remote cache server until Ctrl-C.
pub async fn serve(
    config: &CairnConfig,
    listen: Option<SocketAddr>,
    directory: Option<PathBuf>,
) -> Result<()> {
    let mut server_config = config.server.clone();
    if let Some(listen) = listen {
        server_config.listen = listen;
    }
    if let Some(directory) = directory {
        server_config.directory = Some(directory);
    }

    let server = CacheServer::bind(&server_config).await?;
    let scheme = if server_config.tls.is_some() { "https" } else { "http" };
    println!(
        "{} Serving build cache on {}://{}",
        style("✓").green(),
        scheme,
        server.local_addr()?
    );

    server
        .run(async {
            // An unavailable signal handler must not stop the server.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

fn open_local(config: &CairnConfig) -> Result<LocalStore> {
    let local = &config.cache.local;
    let dir = local.resolved_directory()?;
    LocalStore::open(&dir, local.compression)
        .with_context(|| format!("Failed to open local cache at {}", dir.display()))
}

/// Show entry count and size of the local cache.
pub async fn cache_stats(config: &CairnConfig) -> Result<()> {
    let store = open_local(config)?;
    let root = store.root().to_path_buf();
    let usage = tokio::task::spawn_blocking(move || store.usage()).await??;

    println!("Local cache: {}", style(root.display()).bold());
    println!("  entries: {}", usage.entries);
    println!("  size:    {}", format_bytes(usage.bytes));
    if let Some(max) = config.cache.local.eviction.max_size_bytes {
        println!("  limit:   {}", format_bytes(max));
    }
    Ok(())
}

/// Apply the eviction policy, with optional overrides.
pub async fn evict_cache(
    config: &CairnConfig,
    max_size_bytes: Option<u64>,
    older_than_days: Option<u64>,
) -> Result<()> {
    let store = open_local(config)?;
    let mut policy = config.cache.local.eviction.clone();
    if let Some(max) = max_size_bytes {
        policy = policy.with_max_size_bytes(max);
    }
    if let Some(days) = older_than_days {
        policy = policy.with_remove_unused_after_days(days);
    }

    debug!(?policy, "Evicting local cache entries");
    let report = tokio::task::spawn_blocking(move || store.evict(&policy)).await??;
    info!(
        removed = report.entries_removed,
        freed = report.bytes_freed,
        remaining = report.remaining_entries,
        "Local cache eviction finished"
    );
    println!(
        "{} Removed {} entries ({}), {} remain ({})",
        style("✓").green(),
        report.entries_removed,
        format_bytes(report.bytes_freed),
        report.remaining_entries,
        format_bytes(report.remaining_bytes)
    );
    if report.temp_files_removed > 0 {
        println!("  cleaned {} abandoned temp files", report.temp_files_removed);
    }
    Ok(())
}

/// Remove every local entry.
pub async fn clear_cache(config: &CairnConfig) -> Result<()> {
    let store = open_local(config)?;
    println!("Clearing {}...", style(store.root().display()).bold());
    let removed = tokio::task::spawn_blocking(move || store.clear()).await??;
    info!(removed, "Local cache cleared");
    println!("{} Removed {} entries", style("✓").green(), removed);
    Ok(())
}

/// Print the cache key for the given inputs.
pub fn fingerprint(
    config: &CairnConfig,
    kind: &str,
    version: &str,
    inputs: &[String],
    values: &[String],
    outputs: &[String],
    lookup: bool,
) -> Result<()> {
    let mut builder = Fingerprinter::new(TaskIdentity::new(kind, ""), version);
    for pair in inputs {
        let (name, path) = split_pair(pair)?;
        builder = builder
            .input_file(name, Path::new(path))
            .with_context(|| format!("Failed to hash input {}", path))?;
    }
    for pair in values {
        let (name, value) = split_pair(pair)?;
        builder = builder.value(name, value);
    }
    for name in outputs {
        builder = builder.output(name.as_str());
    }
    let key = builder.finish()?;
    debug!(%key, inputs = builder.inputs().len(), "Computed cache key");

    for input in builder.inputs() {
        println!(
            "  {} {:<9} {}",
            style(&input.name).dim(),
            input.classifier.tag(),
            input.digest
        );
    }
    println!("{}", key);

    if lookup {
        let store = open_local(config)?;
        if store.contains(&key) {
            println!("{} present in local cache", style("✓").green());
        } else {
            println!("{} not in local cache", style("i").blue());
        }
    }
    Ok(())
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("Expected NAME=VALUE, got '{}'", pair),
    }
}

/// Show configuration.
pub fn show_config(config: &CairnConfig, path: Option<&Path>) -> Result<()> {
    println!("Current configuration:");
    print!("{}", serde_yaml::to_string(config)?);

    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => CairnConfig::config_path().ok(),
    };
    if let Some(path) = path {
        println!("\nConfig file: {}", path.display());
    }
    Ok(())
}

/// Set configuration.
pub fn set_config(path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let mut config = CairnConfig::load(path).unwrap_or_default();
    config.set(key, value)?;
    let saved = config.save(path)?;

    println!(
        "{} Set {} = {} ({})",
        style("✓").green(),
        key,
        value,
        saved.display()
    );
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
