//! Port traits (hexagonal architecture).
//!
//! The coordinator composes a local and an optional remote tier through the
//! same capability interface, so either side can be replaced by a fake.

use crate::entry::CacheEntry;
use crate::key::CacheKey;
use crate::Result;
use async_trait::async_trait;

/// Outcome of writing an entry to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The entry was written and is now visible.
    Stored,
    /// An entry for this key already existed; nothing was written.
    AlreadyPresent,
    /// The tier is configured not to accept writes.
    Skipped,
}

/// A cache tier addressable by cache key.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short name used in logs and outcomes ("local", "remote").
    fn name(&self) -> &'static str;

    /// Look up an entry. `Ok(None)` is a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Store an entry under its own key.
    async fn put(&self, entry: &CacheEntry) -> Result<PutOutcome>;
}
