//! CLI command definitions.

use clap::Subcommand;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a remote cache server
    Serve {
        /// Address to listen on (overrides server.listen)
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Storage directory (overrides server.directory)
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// Inspect and maintain the local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Compute the cache key for a set of inputs
    Fingerprint {
        /// Kind of work, e.g. compile-java
        #[arg(long)]
        kind: String,

        /// Task implementation version
        #[arg(long, default_value = "1")]
        version: String,

        /// File input as name=path, in declaration order
        #[arg(short, long = "input", value_name = "NAME=PATH")]
        inputs: Vec<String>,

        /// Property input as name=value, hashed after file inputs
        #[arg(long = "value", value_name = "NAME=VALUE")]
        values: Vec<String>,

        /// Declared output name
        #[arg(short, long = "output", value_name = "NAME")]
        outputs: Vec<String>,

        /// Also report whether the local cache holds the key
        #[arg(long)]
        lookup: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show entry count and size
    Stats,

    /// Apply the eviction policy now
    Evict {
        /// Size ceiling in bytes (overrides local.max_size_bytes)
        #[arg(long)]
        max_size_bytes: Option<u64>,

        /// Remove entries unused for this many days
        #[arg(long)]
        older_than_days: Option<u64>,
    },

    /// Remove every entry
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value, e.g. `remote.push true`
    Set {
        /// Dotted key
        key: String,
        /// Value
        value: String,
    },
}
