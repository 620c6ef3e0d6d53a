//! Build-cache configuration and wiring.

use crate::coordinator::CacheCoordinator;
use crate::stats::CacheSummary;
use cairn_core::{CacheTier, Compression, Error, Result};
use cairn_remote::{RemoteClient, RemoteConfig};
use cairn_store::{EvictionPolicy, EvictionReport, LocalStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Local tier configuration (`local.*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Store root; defaults to the per-user cache directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(flatten)]
    pub eviction: EvictionPolicy,
    #[serde(default)]
    pub compression: Compression,
}

fn default_true() -> bool {
    true
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            eviction: EvictionPolicy::default(),
            compression: Compression::default(),
        }
    }
}

impl LocalConfig {
    /// The configured directory, or `<user cache dir>/build-cache`.
    pub fn resolved_directory(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.directory {
            return Ok(dir.clone());
        }
        let dirs = directories::ProjectDirs::from("dev", "cairn", "cairn")
            .ok_or_else(|| Error::Config("Could not determine cache directory".into()))?;
        Ok(dirs.cache_dir().join("build-cache"))
    }
}

/// Settings consumed from the build configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildCacheConfig {
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

impl BuildCacheConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid build cache configuration: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn with_local_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local.directory = Some(dir.into());
        self
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }
}

/// The cache for one build invocation: a coordinator plus the local store
/// it owns, so the store can be cleaned up when the build ends.
#[derive(Debug, Clone)]
pub struct BuildCache {
    coordinator: Arc<CacheCoordinator>,
    local: Option<LocalStore>,
    eviction: EvictionPolicy,
}

impl BuildCache {
    /// Open the configured tiers. An unusable local directory or invalid
    /// remote settings fail here, before any task runs.
    pub fn from_config(config: &BuildCacheConfig) -> Result<Self> {
        let local = if config.local.enabled {
            let dir = config.local.resolved_directory()?;
            Some(LocalStore::open(dir, config.local.compression)?)
        } else {
            None
        };
        let remote = config
            .remote
            .as_ref()
            .map(|remote| RemoteClient::new(remote).map(|client| (client, remote)))
            .transpose()?;

        let coordinator = match (&local, remote) {
            (Some(store), Some((client, remote))) => {
                CacheCoordinator::new(Arc::new(store.clone()))
                    .with_remote(Arc::new(client), remote.push)
                    .with_max_consecutive_failures(remote.max_consecutive_failures)
            }
            (Some(store), None) => CacheCoordinator::new(Arc::new(store.clone())),
            (None, Some((client, remote))) => {
                CacheCoordinator::remote_only(Arc::new(client) as Arc<dyn CacheTier>, remote.push)
                    .with_max_consecutive_failures(remote.max_consecutive_failures)
            }
            (None, None) => {
                return Err(Error::Config(
                    "build cache needs local.enabled or a remote.url".into(),
                ));
            }
        };

        if let Some(store) = &local {
            info!(directory = %store.root().display(), "Local build cache opened");
        }
        if let Some(remote) = &config.remote {
            info!(url = %remote.url, push = remote.push, "Remote build cache configured");
        }

        Ok(Self {
            coordinator: Arc::new(coordinator),
            local,
            eviction: config.local.eviction.clone(),
        })
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.coordinator
    }

    pub fn local_store(&self) -> Option<&LocalStore> {
        self.local.as_ref()
    }

    /// End of build: log the summary and apply the local eviction policy.
    /// Eviction failures are logged, never returned.
    pub async fn finish(&self) -> (CacheSummary, Option<EvictionReport>) {
        let summary = self.coordinator.summary();
        self.coordinator.log_summary();

        let Some(store) = self.local.clone() else {
            return (summary, None);
        };
        let policy = self.eviction.clone();
        let report = match tokio::task::spawn_blocking(move || store.evict(&policy)).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!(error = %e, "Local build cache eviction failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "Local build cache eviction task failed");
                None
            }
        };
        (summary, report)
    }
}
