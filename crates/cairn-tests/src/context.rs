//! Per-test build context: a scratch local cache plus an optional remote.

use cairn_cache::{BuildCache, BuildCacheConfig, CacheCoordinator};
use cairn_core::Compression;
use cairn_remote::RemoteConfig;
use cairn_store::LocalStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// One simulated build invocation.
pub struct BuildContext {
    pub cache: BuildCache,
    _local_dir: TempDir,
}

impl BuildContext {
    /// Local-only build cache.
    pub fn local_only() -> anyhow::Result<Self> {
        Self::from_config(BuildCacheConfig::default())
    }

    /// Build cache backed by the remote at `url`, with fast timeouts and
    /// retries so failure tests stay quick.
    pub fn with_remote(url: &str, push: bool) -> anyhow::Result<Self> {
        let remote = RemoteConfig::new(url)
            .with_push(push)
            .with_timeouts(Duration::from_secs(2), Duration::from_secs(1))
            .with_retry(2, Duration::from_millis(10), Duration::from_millis(50));
        Self::from_config(BuildCacheConfig::default().with_remote(remote))
    }

    pub fn from_config(mut config: BuildCacheConfig) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        config.local.directory = Some(dir.path().to_path_buf());
        config.local.compression = Compression::None;
        let cache = BuildCache::from_config(&config)?;
        Ok(Self {
            cache,
            _local_dir: dir,
        })
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        self.cache.coordinator()
    }

    pub fn local(&self) -> &LocalStore {
        self.cache
            .local_store()
            .expect("test build contexts always have a local store")
    }
}
