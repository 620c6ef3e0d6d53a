//! Remote cache server configuration (`server.*`).

use cairn_core::{Compression, Error, Result};
use cairn_store::EvictionPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Storage root; defaults to the per-user data directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Largest accepted `PUT` body; larger uploads get `413`.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,
    /// Seconds between eviction passes; 0 disables periodic eviction.
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
    #[serde(flatten)]
    pub eviction: EvictionPolicy,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub tls: Option<ServerTlsConfig>,
}

/// PEM material for serving HTTPS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// When set, clients must present a certificate signed by this CA.
    #[serde(default)]
    pub client_ca: Option<PathBuf>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5071))
}

fn default_max_entry_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_eviction_interval_secs() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            directory: None,
            max_entry_bytes: default_max_entry_bytes(),
            eviction_interval_secs: default_eviction_interval_secs(),
            eviction: EvictionPolicy::default(),
            compression: Compression::default(),
            tls: None,
        }
    }
}

impl ServerConfig {
    /// A config serving `directory` on `listen`.
    pub fn new(listen: SocketAddr, directory: impl Into<PathBuf>) -> Self {
        Self {
            listen,
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    pub fn with_max_entry_bytes(mut self, max: usize) -> Self {
        self.max_entry_bytes = max;
        self
    }

    pub fn with_eviction(mut self, policy: EvictionPolicy, interval: Duration) -> Self {
        self.eviction = policy;
        self.eviction_interval_secs = interval.as_secs();
        self
    }

    pub fn with_tls(mut self, tls: ServerTlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn eviction_interval(&self) -> Option<Duration> {
        (self.eviction_interval_secs > 0).then(|| Duration::from_secs(self.eviction_interval_secs))
    }

    pub fn resolved_directory(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.directory {
            return Ok(dir.clone());
        }
        let dirs = directories::ProjectDirs::from("dev", "cairn", "cairn")
            .ok_or_else(|| Error::Config("Could not determine data directory".into()))?;
        Ok(dirs.data_dir().join("server"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.port(), 5071);
        assert_eq!(config.max_entry_bytes, 100 * 1024 * 1024);
        assert_eq!(config.eviction_interval(), Some(Duration::from_secs(3600)));
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_yaml_with_tls_and_eviction() {
        let config: ServerConfig = serde_yaml::from_str(
            r#"
listen: 127.0.0.1:8443
directory: /srv/cairn
max_size_bytes: 2048
eviction_interval_secs: 0
tls:
  cert: /etc/cairn/server.pem
  key: /etc/cairn/server.key
  client_ca: /etc/cairn/ca.pem
"#,
        )
        .unwrap();
        assert_eq!(config.listen.port(), 8443);
        assert_eq!(config.eviction.max_size_bytes, Some(2048));
        assert_eq!(config.eviction_interval(), None);
        assert!(config.tls.unwrap().client_ca.is_some());
    }
}
