//! Cache outcome counters for the build summary.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by every coordinator call.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub local_hits: AtomicU64,
    pub remote_hits: AtomicU64,
    pub misses: AtomicU64,
    /// Entries newly written to the local store.
    pub local_stores: AtomicU64,
    /// Local writes that found the entry already present.
    pub already_present: AtomicU64,
    pub storage_failures: AtomicU64,
    pub pushes: AtomicU64,
    /// Pushes not attempted: push disabled, remote down or already in flight.
    pub push_skips: AtomicU64,
    pub push_failures: AtomicU64,
    /// Failed remote lookups (network or protocol).
    pub remote_errors: AtomicU64,
    pub bytes_loaded: AtomicU64,
    pub bytes_stored: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_local_hit(&self, bytes: u64) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
        self.bytes_loaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_remote_hit(&self, bytes: u64) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
        self.bytes_loaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_store(&self, bytes: u64) {
        self.local_stores.fetch_add(1, Ordering::Relaxed);
        self.bytes_stored.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_already_present(&self) {
        self.already_present.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of storage failures so far, including this one.
    pub fn record_storage_failure(&self) -> u64 {
        self.storage_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_push(&self) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_push_skip(&self) {
        self.push_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_push_failure(&self) {
        self.push_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_error(&self) {
        self.remote_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> CacheSummary {
        CacheSummary {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            local_stores: self.local_stores.load(Ordering::Relaxed),
            already_present: self.already_present.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            pushes: self.pushes.load(Ordering::Relaxed),
            push_skips: self.push_skips.load(Ordering::Relaxed),
            push_failures: self.push_failures.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            bytes_loaded: self.bytes_loaded.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    pub local_hits: u64,
    pub remote_hits: u64,
    pub misses: u64,
    pub local_stores: u64,
    pub already_present: u64,
    pub storage_failures: u64,
    pub pushes: u64,
    pub push_skips: u64,
    pub push_failures: u64,
    pub remote_errors: u64,
    pub bytes_loaded: u64,
    pub bytes_stored: u64,
}

impl CacheSummary {
    pub fn hits(&self) -> u64 {
        self.local_hits + self.remote_hits
    }

    pub fn lookups(&self) -> u64 {
        self.hits() + self.misses
    }

    /// Fraction of lookups served from a cache, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits() as f64 / n as f64,
        }
    }
}

impl fmt::Display for CacheSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "build cache: {} hit(s) ({} local, {} remote), {} miss(es), {} stored",
            self.hits(),
            self.local_hits,
            self.remote_hits,
            self.misses,
            self.local_stores
        )?;
        if self.pushes > 0 || self.push_failures > 0 {
            write!(f, ", {} pushed", self.pushes)?;
        }
        if self.push_failures > 0 {
            write!(f, ", {} push failure(s)", self.push_failures)?;
        }
        if self.remote_errors > 0 {
            write!(f, ", {} remote error(s)", self.remote_errors)?;
        }
        if self.storage_failures > 0 {
            write!(f, ", {} storage failure(s)", self.storage_failures)?;
        }
        Ok(())
    }
}
