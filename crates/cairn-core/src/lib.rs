//! Cairn Core
//!
//! Domain types, error taxonomy and the entry wire codec shared by every
//! cairn crate. The fingerprint engine, stores and coordinator all speak
//! this vocabulary.

pub mod codec;
pub mod entry;
pub mod error;
pub mod key;
pub mod ports;

pub use codec::{Compression, EntryCodec};
pub use entry::{CacheEntry, OutputBlob, OutputSet, TaskIdentity};
pub use error::{Error, Result};
pub use key::{CacheKey, ContentDigest, DIGEST_LEN};
pub use ports::{CacheTier, PutOutcome};
