//! Directory-backed local cache store.
//!
//! Layout under the store root:
//!
//! ```text
//! entries/ab/ab12…ef.entry   fully written, visible entries (sharded by key prefix)
//! tmp/put-XXXX.tmp           staged writes, never visible to readers
//! ```
//!
//! Writes are staged in `tmp/` and moved into place with a no-clobber rename,
//! so readers only ever see complete entries and the first writer wins.

use cairn_core::{
    CacheEntry, CacheKey, CacheTier, Compression, EntryCodec, Error, PutOutcome, Result,
};
use async_trait::async_trait;
use filetime::FileTime;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) const ENTRIES_DIR: &str = "entries";
pub(crate) const TMP_DIR: &str = "tmp";
pub(crate) const ENTRY_EXTENSION: &str = "entry";

/// Local cache store shared by every worker of a build invocation.
///
/// Cloning is cheap; all clones address the same directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    root: PathBuf,
    codec: EntryCodec,
}

/// Number and size of visible entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreUsage {
    pub entries: u64,
    pub bytes: u64,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// An unusable directory is a configuration error, reported once here
    /// rather than on every call.
    pub fn open(root: impl Into<PathBuf>, compression: Compression) -> Result<Self> {
        let root = root.into();
        for dir in [root.join(ENTRIES_DIR), root.join(TMP_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| unusable_dir(&dir, e))?;
        }

        // Probe that staged writes are possible before any task relies on it.
        tempfile::Builder::new()
            .prefix("probe-")
            .tempfile_in(root.join(TMP_DIR))
            .map_err(|e| unusable_dir(&root, e))?;

        debug!(root = %root.display(), ?compression, "Opened local cache store");
        Ok(Self {
            inner: Arc::new(StoreInner {
                root,
                codec: EntryCodec::new(compression),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub(crate) fn entries_dir(&self) -> PathBuf {
        self.inner.root.join(ENTRIES_DIR)
    }

    pub(crate) fn tmp_dir(&self) -> PathBuf {
        self.inner.root.join(TMP_DIR)
    }

    /// Where the entry for `key` lives once written.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.entries_dir()
            .join(key.shard())
            .join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Read an entry, blocking on disk I/O.
    ///
    /// Absent and corrupt entries are both misses; a corrupt file is removed
    /// so a later write can replace it.
    pub fn read_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            // Also covers an entry evicted between lookup and read.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(&path, e)),
        };

        match self.decode_checked(key, &bytes) {
            Ok(entry) => {
                // Last-use time drives LRU eviction.
                if let Err(e) = filetime::set_file_mtime(&path, FileTime::now()) {
                    debug!(%key, error = %e, "Could not record entry access time");
                }
                Ok(Some(entry))
            }
            Err(err) => {
                warn!(%key, error = %err, "Discarding corrupt cache entry");
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!(%key, error = %e, "Failed to remove corrupt cache entry"),
                }
                Ok(None)
            }
        }
    }

    fn decode_checked(&self, key: &CacheKey, bytes: &[u8]) -> Result<CacheEntry> {
        let entry = self.inner.codec.decode(bytes)?;
        if entry.key != *key {
            return Err(Error::Protocol(format!(
                "entry file for {} contains key {}",
                key, entry.key
            )));
        }
        entry.verify()?;
        Ok(entry)
    }

    /// Write an entry, blocking on disk I/O.
    ///
    /// Idempotent: an existing entry for the key is left untouched.
    pub fn write_entry(&self, entry: &CacheEntry) -> Result<PutOutcome> {
        let path = self.entry_path(&entry.key);
        if path.is_file() {
            return Ok(PutOutcome::AlreadyPresent);
        }

        entry.verify()?;
        let bytes = self.inner.codec.encode(entry)?;

        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard).map_err(|e| Error::storage(shard, e))?;
        }

        // Dropping the staged file on any error below removes it.
        let tmp_dir = self.tmp_dir();
        let mut staged = tempfile::Builder::new()
            .prefix("put-")
            .suffix(".tmp")
            .tempfile_in(&tmp_dir)
            .map_err(|e| Error::storage(&tmp_dir, e))?;
        staged
            .write_all(&bytes)
            .map_err(|e| Error::storage(staged.path(), e))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| Error::storage(staged.path(), e))?;

        match staged.persist_noclobber(&path) {
            Ok(_) => {
                debug!(key = %entry.key, bytes = bytes.len(), "Stored local cache entry");
                Ok(PutOutcome::Stored)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!(key = %entry.key, "Concurrent writer stored entry first");
                Ok(PutOutcome::AlreadyPresent)
            }
            Err(e) => Err(Error::storage(&path, e.error)),
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        remove_entry_file(&self.entry_path(key))
    }

    /// Remove every visible entry. In-flight writes are unaffected.
    pub fn clear(&self) -> Result<u64> {
        let mut removed = 0;
        for file in self.scan_entries()? {
            if remove_entry_file(&file.path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn usage(&self) -> Result<StoreUsage> {
        let files = self.scan_entries()?;
        Ok(StoreUsage {
            entries: files.len() as u64,
            bytes: files.iter().map(|f| f.size).sum(),
        })
    }
}

pub(crate) fn remove_entry_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::storage(path, e)),
    }
}

fn unusable_dir(path: &Path, source: std::io::Error) -> Error {
    Error::Config(format!(
        "cache directory {} is not usable: {}",
        path.display(),
        source
    ))
}

#[async_trait]
impl CacheTier for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let store = self.clone();
        let key = *key;
        tokio::task::spawn_blocking(move || store.read_entry(&key))
            .await
            .map_err(|e| Error::Internal(format!("local read task failed: {e}")))?
    }

    async fn put(&self, entry: &CacheEntry) -> Result<PutOutcome> {
        let store = self.clone();
        let entry = entry.clone();
        // The blocking write runs to completion even if this future is dropped.
        tokio::task::spawn_blocking(move || store.write_entry(&entry))
            .await
            .map_err(|e| Error::Internal(format!("local write task failed: {e}")))?
    }
}
