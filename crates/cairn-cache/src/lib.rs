//! Cairn build cache.
//!
//! The fingerprint engine that derives cache keys from task inputs, and the
//! coordinator that composes the local and remote tiers for the scheduler.

pub mod config;
pub mod coordinator;
pub mod fingerprint;
pub mod stats;

pub use config::{BuildCache, BuildCacheConfig, LocalConfig};
pub use coordinator::{
    CacheCoordinator, LoadOutcome, LocalStatus, PushStatus, StoreReport, TierSource,
};
pub use fingerprint::{Fingerprinter, InputClassifier, InputFingerprint, fingerprint};
pub use stats::{CacheStats, CacheSummary};
