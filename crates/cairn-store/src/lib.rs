//! Local cache tier for cairn.
//!
//! A content-addressed, directory-backed store with atomic writes,
//! corruption-as-miss reads and LRU eviction. The remote cache server uses
//! the same store for its own storage.

pub mod archiver;
pub mod eviction;
pub mod local;

pub use archiver::{archive_paths, restore_archive};
pub use eviction::{EvictionPolicy, EvictionReport};
pub use local::{LocalStore, StoreUsage};
