//! The cache facade the scheduler calls once per task.
//!
//! Lookups go local first, then remote; remote hits are promoted into the
//! local tier. Stores always go to the local tier and are pushed when a
//! remote is configured with pushing enabled. Nothing here fails a task:
//! remote problems degrade to misses and local write failures are reported
//! as warnings.

use crate::stats::{CacheStats, CacheSummary};
use cairn_core::{CacheEntry, CacheKey, CacheTier, Error, OutputSet, PutOutcome, TaskIdentity};
use cairn_trace::cache_span;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{Instrument, debug, error, info, warn};

/// Storage failures from this count on are logged as errors.
const RECURRING_STORAGE_FAILURES: u64 = 3;

/// Tier that satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierSource {
    Local,
    Remote,
}

impl fmt::Display for TierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierSource::Local => f.write_str("local"),
            TierSource::Remote => f.write_str("remote"),
        }
    }
}

/// Result of [`CacheCoordinator::try_load`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Hit { entry: CacheEntry, source: TierSource },
    Miss,
}

impl LoadOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, LoadOutcome::Hit { .. })
    }

    pub fn source(&self) -> Option<TierSource> {
        match self {
            LoadOutcome::Hit { source, .. } => Some(*source),
            LoadOutcome::Miss => None,
        }
    }

    /// The cached outputs, or `None` on a miss.
    pub fn into_outputs(self) -> Option<OutputSet> {
        match self {
            LoadOutcome::Hit { entry, .. } => Some(OutputSet::from(entry.outputs)),
            LoadOutcome::Miss => None,
        }
    }
}

/// What happened to the local copy during a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalStatus {
    Stored,
    AlreadyPresent,
    /// No local tier is configured.
    Disabled,
    /// The write failed; the message is meant for the build's warnings.
    Failed(String),
}

/// What happened to the remote copy during a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    Pushed,
    AlreadyPresent,
    /// A remote is configured but pushing is turned off.
    Disabled,
    NoRemote,
    /// Another store for the same key is pushing right now.
    InFlight,
    /// The remote was disabled after repeated failures.
    RemoteUnavailable,
    Failed(String),
}

/// Outcome of [`CacheCoordinator::store`]. Never a task failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReport {
    pub local: LocalStatus,
    pub remote: PushStatus,
}

impl StoreReport {
    /// A warning worth surfacing to the user, if the local write failed.
    pub fn warning(&self) -> Option<&str> {
        match &self.local {
            LocalStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Disables the remote tier after too many consecutive network failures.
#[derive(Debug)]
struct RemoteHealth {
    consecutive_failures: AtomicU32,
    disabled: AtomicBool,
    max_consecutive_failures: u32,
}

impl RemoteHealth {
    fn new(max_consecutive_failures: u32) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            disabled: AtomicBool::new(false),
            max_consecutive_failures,
        }
    }

    fn is_available(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self, error: &Error) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if self.max_consecutive_failures > 0
            && failures >= self.max_consecutive_failures
            && !self.disabled.swap(true, Ordering::Relaxed)
        {
            warn!(
                failures,
                error = %error,
                "Remote build cache disabled for the rest of this build"
            );
        }
    }
}

/// Tracks keys with a push in progress. Held only briefly, never across an
/// await point.
#[derive(Debug, Default)]
struct InFlightPushes(Mutex<HashSet<CacheKey>>);

impl InFlightPushes {
    fn try_begin(&self, key: CacheKey) -> Option<InFlightGuard<'_>> {
        let mut keys = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if keys.insert(key) {
            Some(InFlightGuard { owner: self, key })
        } else {
            None
        }
    }
}

struct InFlightGuard<'a> {
    owner: &'a InFlightPushes,
    key: CacheKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut keys = self.owner.0.lock().unwrap_or_else(|e| e.into_inner());
        keys.remove(&self.key);
    }
}

/// Composes a local and an optional remote tier.
///
/// Built once per build invocation and shared by all workers behind an
/// `Arc`; every method takes `&self`.
pub struct CacheCoordinator {
    local: Option<Arc<dyn CacheTier>>,
    remote: Option<Arc<dyn CacheTier>>,
    push_enabled: bool,
    remote_health: RemoteHealth,
    in_flight: InFlightPushes,
    stats: Arc<CacheStats>,
}

impl fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("local", &self.local.as_ref().map(|t| t.name()))
            .field("remote", &self.remote.as_ref().map(|t| t.name()))
            .field("push_enabled", &self.push_enabled)
            .finish()
    }
}

impl CacheCoordinator {
    /// A coordinator over `local` only.
    pub fn new(local: Arc<dyn CacheTier>) -> Self {
        Self {
            local: Some(local),
            remote: None,
            push_enabled: false,
            remote_health: RemoteHealth::new(3),
            in_flight: InFlightPushes::default(),
            stats: CacheStats::new(),
        }
    }

    /// A coordinator with no local tier, for builds that only use a remote.
    pub fn remote_only(remote: Arc<dyn CacheTier>, push_enabled: bool) -> Self {
        Self {
            local: None,
            remote: None,
            push_enabled: false,
            remote_health: RemoteHealth::new(3),
            in_flight: InFlightPushes::default(),
            stats: CacheStats::new(),
        }
        .with_remote(remote, push_enabled)
    }

    pub fn with_remote(mut self, remote: Arc<dyn CacheTier>, push_enabled: bool) -> Self {
        self.remote = Some(remote);
        self.push_enabled = push_enabled;
        self
    }

    /// Consecutive remote failures after which the remote is disabled; 0
    /// never disables it.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.remote_health = RemoteHealth::new(max);
        self
    }

    pub fn with_stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    pub fn summary(&self) -> CacheSummary {
        self.stats.summary()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    /// Whether the remote tier is configured and has not been disabled.
    pub fn remote_available(&self) -> bool {
        self.remote.is_some() && self.remote_health.is_available()
    }

    /// Look `key` up in the local tier, then the remote tier.
    pub async fn try_load(&self, key: &CacheKey) -> LoadOutcome {
        let span = cache_span("try_load", &key.to_hex());
        self.try_load_inner(key).instrument(span).await
    }

    async fn try_load_inner(&self, key: &CacheKey) -> LoadOutcome {
        if let Some(local) = &self.local {
            match local.get(key).await {
                Ok(Some(entry)) => {
                    debug!("Local cache hit");
                    self.stats.record_local_hit(entry.size_bytes());
                    return LoadOutcome::Hit {
                        entry,
                        source: TierSource::Local,
                    };
                }
                Ok(None) => {}
                Err(e) => self.storage_failure("read", &e),
            }
        }

        if let Some(entry) = self.pull(key).await {
            self.stats.record_remote_hit(entry.size_bytes());
            self.promote(&entry).await;
            return LoadOutcome::Hit {
                entry,
                source: TierSource::Remote,
            };
        }

        debug!("Cache miss");
        self.stats.record_miss();
        LoadOutcome::Miss
    }

    async fn pull(&self, key: &CacheKey) -> Option<CacheEntry> {
        let remote = self.remote.as_ref()?;
        if !self.remote_health.is_available() {
            return None;
        }

        match remote.get(key).await {
            Ok(Some(entry)) => {
                self.remote_health.record_success();
                match check_remote_entry(key, &entry) {
                    Ok(()) => {
                        debug!("Remote cache hit");
                        Some(entry)
                    }
                    Err(e) => {
                        warn!(error = %e, "Discarding invalid remote cache entry");
                        self.stats.record_remote_error();
                        None
                    }
                }
            }
            Ok(None) => {
                self.remote_health.record_success();
                None
            }
            Err(e) => {
                self.stats.record_remote_error();
                if e.is_network() {
                    warn!(error = %e, "Remote cache unavailable, treating as miss");
                    self.remote_health.record_failure(&e);
                } else {
                    warn!(error = %e, "Remote cache returned an unusable entry");
                }
                None
            }
        }
    }

    async fn promote(&self, entry: &CacheEntry) {
        let Some(local) = &self.local else {
            return;
        };
        match local.put(entry).await {
            Ok(outcome) => debug!(?outcome, "Promoted remote entry to local cache"),
            Err(e) => self.storage_failure("promote", &e),
        }
    }

    /// Record a task's outputs under `key`.
    pub async fn store(&self, key: CacheKey, task: TaskIdentity, outputs: OutputSet) -> StoreReport {
        let span = cache_span("store", &key.to_hex());
        let entry = CacheEntry::new(key, task, outputs);
        async {
            let local = self.store_local(&entry).await;
            let remote = self.push(&entry).await;
            debug!(?local, ?remote, "Cache store finished");
            StoreReport { local, remote }
        }
        .instrument(span)
        .await
    }

    async fn store_local(&self, entry: &CacheEntry) -> LocalStatus {
        let Some(local) = &self.local else {
            return LocalStatus::Disabled;
        };
        match local.put(entry).await {
            Ok(PutOutcome::Stored) => {
                self.stats.record_local_store(entry.size_bytes());
                LocalStatus::Stored
            }
            Ok(PutOutcome::AlreadyPresent) => {
                self.stats.record_already_present();
                LocalStatus::AlreadyPresent
            }
            Ok(PutOutcome::Skipped) => LocalStatus::Disabled,
            Err(e) => {
                self.storage_failure("write", &e);
                let mut message = format!("failed to store {} in the local cache: {}", entry.task, e);
                if let Some(hint) = storage_hint(&e) {
                    message.push_str(" (");
                    message.push_str(hint);
                    message.push(')');
                }
                LocalStatus::Failed(message)
            }
        }
    }

    async fn push(&self, entry: &CacheEntry) -> PushStatus {
        let Some(remote) = &self.remote else {
            return PushStatus::NoRemote;
        };
        if !self.push_enabled {
            self.stats.record_push_skip();
            return PushStatus::Disabled;
        }
        if !self.remote_health.is_available() {
            self.stats.record_push_skip();
            return PushStatus::RemoteUnavailable;
        }
        let Some(_guard) = self.in_flight.try_begin(entry.key) else {
            debug!("Push already in flight for this key");
            self.stats.record_push_skip();
            return PushStatus::InFlight;
        };

        match remote.put(entry).await {
            Ok(PutOutcome::Stored) => {
                self.remote_health.record_success();
                self.stats.record_push();
                PushStatus::Pushed
            }
            Ok(PutOutcome::AlreadyPresent) => {
                self.remote_health.record_success();
                PushStatus::AlreadyPresent
            }
            Ok(PutOutcome::Skipped) => {
                self.stats.record_push_skip();
                PushStatus::Disabled
            }
            Err(e) => {
                warn!(error = %e, task = %entry.task, "Failed to push to remote cache");
                self.stats.record_push_failure();
                if e.is_network() {
                    self.remote_health.record_failure(&e);
                }
                PushStatus::Failed(e.to_string())
            }
        }
    }

    fn storage_failure(&self, operation: &str, error: &Error) {
        let count = self.stats.record_storage_failure();
        let hint = storage_hint(error).unwrap_or("");
        if count >= RECURRING_STORAGE_FAILURES {
            error!(operation, count, error = %error, hint, "Local build cache keeps failing");
        } else {
            warn!(operation, error = %error, hint, "Local build cache operation failed");
        }
    }

    /// Log the build summary line.
    pub fn log_summary(&self) {
        info!("{}", self.summary());
    }
}

fn check_remote_entry(key: &CacheKey, entry: &CacheEntry) -> cairn_core::Result<()> {
    if entry.key != *key {
        return Err(Error::Protocol(format!(
            "remote returned entry {} for key {}",
            entry.key, key
        )));
    }
    entry.verify()
}

/// What the user can do about a local storage failure, when it is obvious.
fn storage_hint(error: &Error) -> Option<&'static str> {
    if error.is_disk_full() {
        Some("disk is full; free space or lower local.max_size_bytes")
    } else if error.is_permission_denied() {
        Some("check permissions on local.directory")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cairn_core::Result;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// In-memory tier with switchable failure modes.
    #[derive(Default)]
    struct FakeTier {
        entries: Mutex<HashMap<CacheKey, CacheEntry>>,
        fail_network: AtomicBool,
        fail_storage: AtomicBool,
        gets: AtomicUsize,
        puts: AtomicUsize,
        /// When set, `put` waits for a notification before storing.
        put_gate: Option<Arc<Notify>>,
    }

    impl FakeTier {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                put_gate: Some(gate),
                ..Self::default()
            })
        }

        fn insert(&self, entry: CacheEntry) {
            self.entries.lock().unwrap().insert(entry.key, entry);
        }

        fn contains(&self, key: &CacheKey) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }

        fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CacheTier for FakeTier {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_network.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            if self.fail_storage.load(Ordering::SeqCst) {
                return Err(Error::storage(
                    "/cache",
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                ));
            }
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, entry: &CacheEntry) -> Result<PutOutcome> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.put_gate {
                gate.notified().await;
            }
            if self.fail_network.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            if self.fail_storage.load(Ordering::SeqCst) {
                return Err(Error::storage(
                    "/cache",
                    std::io::Error::from(std::io::ErrorKind::StorageFull),
                ));
            }
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(&entry.key) {
                return Ok(PutOutcome::AlreadyPresent);
            }
            entries.insert(entry.key, entry.clone());
            Ok(PutOutcome::Stored)
        }
    }

    fn key(seed: u8) -> CacheKey {
        CacheKey::from_bytes([seed; 32])
    }

    fn task() -> TaskIdentity {
        TaskIdentity::new("compile", ":app:compile")
    }

    fn outputs() -> OutputSet {
        OutputSet::new().with("classes", "bytecode")
    }

    fn entry(seed: u8) -> CacheEntry {
        CacheEntry::new(key(seed), task(), outputs())
    }

    #[tokio::test]
    async fn test_miss_then_store_then_local_hit() {
        let local = FakeTier::new();
        let coordinator = CacheCoordinator::new(local.clone());

        assert_eq!(coordinator.try_load(&key(1)).await, LoadOutcome::Miss);

        let report = coordinator.store(key(1), task(), outputs()).await;
        assert_eq!(report.local, LocalStatus::Stored);
        assert_eq!(report.remote, PushStatus::NoRemote);

        let outcome = coordinator.try_load(&key(1)).await;
        assert_eq!(outcome.source(), Some(TierSource::Local));
        assert_eq!(outcome.into_outputs(), Some(outputs()));

        let summary = coordinator.summary();
        assert_eq!((summary.local_hits, summary.misses, summary.local_stores), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_store_twice_keeps_one_entry() {
        let local = FakeTier::new();
        let coordinator = CacheCoordinator::new(local.clone());

        coordinator.store(key(1), task(), outputs()).await;
        let second = coordinator.store(key(1), task(), outputs()).await;

        assert_eq!(second.local, LocalStatus::AlreadyPresent);
        assert_eq!(local.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_hit_is_promoted_to_local() {
        let local = FakeTier::new();
        let remote = FakeTier::new();
        remote.insert(entry(2));
        let coordinator = CacheCoordinator::new(local.clone()).with_remote(remote.clone(), false);

        let outcome = coordinator.try_load(&key(2)).await;
        assert_eq!(outcome.source(), Some(TierSource::Remote));
        assert!(local.contains(&key(2)));

        // Served locally from now on.
        let again = coordinator.try_load(&key(2)).await;
        assert_eq!(again.source(), Some(TierSource::Local));
        assert_eq!(remote.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_entry_with_wrong_key_is_a_miss() {
        let local = FakeTier::new();
        let remote = FakeTier::new();
        // Stored under key(3) but claiming key(4).
        remote.entries.lock().unwrap().insert(key(3), entry(4));
        let coordinator = CacheCoordinator::new(local.clone()).with_remote(remote, false);

        assert_eq!(coordinator.try_load(&key(3)).await, LoadOutcome::Miss);
        assert!(!local.contains(&key(3)));
        assert_eq!(coordinator.summary().remote_errors, 1);
    }

    #[tokio::test]
    async fn test_push_disabled_stores_only_locally() {
        let local = FakeTier::new();
        let remote = FakeTier::new();
        let coordinator = CacheCoordinator::new(local.clone()).with_remote(remote.clone(), false);

        let report = coordinator.store(key(5), task(), outputs()).await;
        assert_eq!(report.local, LocalStatus::Stored);
        assert_eq!(report.remote, PushStatus::Disabled);
        assert!(local.contains(&key(5)));
        assert!(!remote.contains(&key(5)));
        assert_eq!(remote.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_enabled_writes_both_tiers() {
        let local = FakeTier::new();
        let remote = FakeTier::new();
        let coordinator = CacheCoordinator::new(local.clone()).with_remote(remote.clone(), true);

        let report = coordinator.store(key(6), task(), outputs()).await;
        assert_eq!(report.remote, PushStatus::Pushed);
        assert!(remote.contains(&key(6)));

        let again = coordinator.store(key(6), task(), outputs()).await;
        assert_eq!(again.remote, PushStatus::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_remote_outage_degrades_to_miss_and_local_store() {
        let local = FakeTier::new();
        let remote = FakeTier::new();
        remote.fail_network.store(true, Ordering::SeqCst);
        let coordinator = CacheCoordinator::new(local.clone()).with_remote(remote, true);

        assert_eq!(coordinator.try_load(&key(7)).await, LoadOutcome::Miss);

        let report = coordinator.store(key(7), task(), outputs()).await;
        assert_eq!(report.local, LocalStatus::Stored);
        assert!(matches!(report.remote, PushStatus::Failed(_)));
        assert!(report.warning().is_none());
        assert!(local.contains(&key(7)));
    }

    #[tokio::test]
    async fn test_repeated_network_failures_disable_remote() {
        let local = FakeTier::new();
        let remote = FakeTier::new();
        remote.fail_network.store(true, Ordering::SeqCst);
        let coordinator = CacheCoordinator::new(local)
            .with_remote(remote.clone(), true)
            .with_max_consecutive_failures(2);

        coordinator.try_load(&key(1)).await;
        coordinator.try_load(&key(2)).await;
        assert!(!coordinator.remote_available());

        coordinator.try_load(&key(3)).await;
        assert_eq!(remote.gets.load(Ordering::SeqCst), 2);

        let report = coordinator.store(key(3), task(), outputs()).await;
        assert_eq!(report.remote, PushStatus::RemoteUnavailable);
        assert_eq!(remote.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let remote = FakeTier::new();
        let coordinator = CacheCoordinator::new(FakeTier::new())
            .with_remote(remote.clone(), false)
            .with_max_consecutive_failures(2);

        remote.fail_network.store(true, Ordering::SeqCst);
        coordinator.try_load(&key(1)).await;
        remote.fail_network.store(false, Ordering::SeqCst);
        coordinator.try_load(&key(1)).await;
        remote.fail_network.store(true, Ordering::SeqCst);
        coordinator.try_load(&key(1)).await;

        assert!(coordinator.remote_available());
    }

    #[tokio::test]
    async fn test_local_storage_failure_is_a_warning_not_an_error() {
        let local = FakeTier::new();
        local.fail_storage.store(true, Ordering::SeqCst);
        let coordinator = CacheCoordinator::new(local);

        assert_eq!(coordinator.try_load(&key(8)).await, LoadOutcome::Miss);
        let report = coordinator.store(key(8), task(), outputs()).await;

        assert!(matches!(report.local, LocalStatus::Failed(_)));
        assert!(report.warning().unwrap().contains(":app:compile"));
        assert!(report.warning().unwrap().contains("disk is full"));
        assert_eq!(coordinator.summary().storage_failures, 2);
    }

    #[test]
    fn test_storage_hints() {
        let denied = Error::storage(
            "/cache",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(storage_hint(&denied), Some("check permissions on local.directory"));
        assert_eq!(storage_hint(&Error::Network("refused".into())), None);
    }

    #[tokio::test]
    async fn test_local_read_failure_still_consults_remote() {
        let local = FakeTier::new();
        local.fail_storage.store(true, Ordering::SeqCst);
        let remote = FakeTier::new();
        remote.insert(entry(9));
        let coordinator = CacheCoordinator::new(local).with_remote(remote, false);

        let outcome = coordinator.try_load(&key(9)).await;
        assert_eq!(outcome.source(), Some(TierSource::Remote));
    }

    #[tokio::test]
    async fn test_concurrent_store_pushes_once() {
        let gate = Arc::new(Notify::new());
        let remote = FakeTier::gated(gate.clone());
        let coordinator = Arc::new(
            CacheCoordinator::new(FakeTier::new()).with_remote(remote.clone(), true),
        );

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.store(key(10), task(), outputs()).await })
        };
        // Wait until the first push is blocked inside the remote.
        while remote.puts.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = coordinator.store(key(10), task(), outputs()).await;
        assert_eq!(second.remote, PushStatus::InFlight);

        gate.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.remote, PushStatus::Pushed);
        assert_eq!(remote.puts.load(Ordering::SeqCst), 1);

        // The guard is released once the push finishes.
        gate.notify_one();
        let third = coordinator.store(key(10), task(), outputs()).await;
        assert_eq!(third.remote, PushStatus::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_remote_only_coordinator() {
        let remote = FakeTier::new();
        let coordinator = CacheCoordinator::remote_only(remote.clone(), true);

        let report = coordinator.store(key(11), task(), outputs()).await;
        assert_eq!(report.local, LocalStatus::Disabled);
        assert_eq!(report.remote, PushStatus::Pushed);
        assert!(coordinator.try_load(&key(11)).await.is_hit());
    }
}
