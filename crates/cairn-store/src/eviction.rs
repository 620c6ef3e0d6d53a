//! Eviction for the local store.
//!
//! Policy: entries unused for longer than `remove_unused_after_days` are
//! dropped, then least-recently-used entries are removed until the store
//! fits in `max_size_bytes`. An entry's last use is its file mtime, which
//! every hit refreshes.

use crate::local::{ENTRY_EXTENSION, LocalStore, remove_entry_file};
use cairn_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Staged writes older than this are considered abandoned.
pub const STALE_TEMP_AFTER: Duration = Duration::from_secs(60 * 60);

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Eviction policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPolicy {
    /// Ceiling on the total size of visible entries.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: Option<u64>,
    /// Remove entries not used for this many days.
    #[serde(default = "default_remove_unused_after_days")]
    pub remove_unused_after_days: Option<u64>,
}

fn default_max_size_bytes() -> Option<u64> {
    Some(5 * 1024 * 1024 * 1024)
}

fn default_remove_unused_after_days() -> Option<u64> {
    Some(7)
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            remove_unused_after_days: default_remove_unused_after_days(),
        }
    }
}

impl EvictionPolicy {
    /// A policy that never removes visible entries.
    pub fn unbounded() -> Self {
        Self {
            max_size_bytes: None,
            remove_unused_after_days: None,
        }
    }

    pub fn with_max_size_bytes(mut self, max: u64) -> Self {
        self.max_size_bytes = Some(max);
        self
    }

    pub fn with_remove_unused_after_days(mut self, days: u64) -> Self {
        self.remove_unused_after_days = Some(days);
        self
    }

    fn max_unused(&self) -> Option<Duration> {
        self.remove_unused_after_days
            .map(|days| Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
    }
}

/// Result of an eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub entries_removed: u64,
    pub bytes_freed: u64,
    pub temp_files_removed: u64,
    pub remaining_entries: u64,
    pub remaining_bytes: u64,
}

/// A visible entry file found on disk.
#[derive(Debug, Clone)]
pub(crate) struct EntryFile {
    pub path: PathBuf,
    pub size: u64,
    pub last_used: SystemTime,
}

impl LocalStore {
    /// Apply `policy`, blocking on disk I/O.
    ///
    /// Safe to run while other workers read and write: only renamed entry
    /// files are candidates, and readers treat a vanished entry as a miss.
    pub fn evict(&self, policy: &EvictionPolicy) -> Result<EvictionReport> {
        let now = SystemTime::now();
        let mut report = EvictionReport {
            temp_files_removed: self.remove_stale_temp_files(now)?,
            ..Default::default()
        };

        let mut files = self.scan_entries()?;
        files.sort_by_key(|f| f.last_used);

        let cutoff = policy.max_unused().and_then(|d| now.checked_sub(d));
        let mut total: u64 = files.iter().map(|f| f.size).sum();

        for file in files {
            let expired = cutoff.is_some_and(|c| file.last_used < c);
            let over_budget = policy.max_size_bytes.is_some_and(|max| total > max);
            if !expired && !over_budget {
                report.remaining_entries += 1;
                continue;
            }
            if remove_entry_file(&file.path)? {
                debug!(path = %file.path.display(), expired, "Evicted cache entry");
                report.entries_removed += 1;
                report.bytes_freed += file.size;
            }
            total = total.saturating_sub(file.size);
        }
        report.remaining_bytes = total;

        if report.entries_removed > 0 || report.temp_files_removed > 0 {
            info!(
                removed = report.entries_removed,
                freed = report.bytes_freed,
                temp_removed = report.temp_files_removed,
                remaining = report.remaining_entries,
                "Local cache eviction finished"
            );
        }
        Ok(report)
    }

    pub(crate) fn scan_entries(&self) -> Result<Vec<EntryFile>> {
        let mut files = Vec::new();
        let entries_dir = self.entries_dir();
        for shard in read_dir_tolerant(&entries_dir)? {
            if !shard.is_dir() {
                continue;
            }
            for path in read_dir_tolerant(&shard)? {
                if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                    continue;
                }
                let metadata = match fs::metadata(&path) {
                    Ok(m) => m,
                    // Removed by a concurrent eviction or clear.
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(Error::storage(&path, e)),
                };
                files.push(EntryFile {
                    size: metadata.len(),
                    last_used: metadata.modified().map_err(|e| Error::storage(&path, e))?,
                    path,
                });
            }
        }
        Ok(files)
    }

    fn remove_stale_temp_files(&self, now: SystemTime) -> Result<u64> {
        let mut removed = 0;
        for path in read_dir_tolerant(&self.tmp_dir())? {
            let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age > STALE_TEMP_AFTER && remove_entry_file(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn read_dir_tolerant(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::storage(dir, e)),
    };
    let mut paths = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::storage(dir, e))?;
        paths.push(entry.path());
    }
    Ok(paths)
}
