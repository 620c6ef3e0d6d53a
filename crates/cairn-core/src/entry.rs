//! Cache entries and the output blobs they carry.

use crate::key::{CacheKey, ContentDigest};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the kind of work and where it lives in the project.
///
/// Only `kind` takes part in cache keys; `path` is recorded as metadata so
/// identical work at different locations shares entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIdentity {
    /// Type of work, e.g. `compile-java` or `rustc`.
    pub kind: String,
    /// Project-relative task path, e.g. `:lib:compileJava`.
    pub path: String,
}

impl TaskIdentity {
    pub fn new(kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.kind)
    }
}

/// A named output produced by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBlob {
    pub name: String,
    pub digest: ContentDigest,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl OutputBlob {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            digest: ContentDigest::of_bytes(&data),
            data,
        }
    }

    /// Check the stored digest against the bytes.
    pub fn verify(&self) -> Result<()> {
        let actual = ContentDigest::of_bytes(&self.data);
        if actual != self.digest {
            return Err(Error::Protocol(format!(
                "output '{}' digest mismatch: expected {}, got {}",
                self.name, self.digest, actual
            )));
        }
        Ok(())
    }
}

/// Ordered set of named outputs handed to the cache after a task runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSet {
    blobs: Vec<OutputBlob>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output, replacing any earlier output with the same name.
    pub fn with(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let blob = OutputBlob::new(name, data.into());
        match self.blobs.iter_mut().find(|b| b.name == blob.name) {
            Some(existing) => *existing = blob,
            None => self.blobs.push(blob),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.blobs
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.data.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blobs.iter().map(|b| b.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn into_blobs(self) -> Vec<OutputBlob> {
        self.blobs
    }
}

impl From<Vec<OutputBlob>> for OutputSet {
    fn from(blobs: Vec<OutputBlob>) -> Self {
        Self { blobs }
    }
}

/// Immutable stored output set for one cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Task that produced the entry.
    pub task: TaskIdentity,
    pub created_at: DateTime<Utc>,
    pub outputs: Vec<OutputBlob>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, task: TaskIdentity, outputs: OutputSet) -> Self {
        Self {
            key,
            task,
            created_at: Utc::now(),
            outputs: outputs.into_blobs(),
        }
    }

    /// Verify every blob digest.
    pub fn verify(&self) -> Result<()> {
        self.outputs.iter().try_for_each(OutputBlob::verify)
    }

    /// Total payload bytes across all outputs.
    pub fn size_bytes(&self) -> u64 {
        self.outputs.iter().map(|b| b.data.len() as u64).sum()
    }

    pub fn output(&self, name: &str) -> Option<&[u8]> {
        self.outputs
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.data.as_slice())
    }

    pub fn to_output_set(&self) -> OutputSet {
        OutputSet::from(self.outputs.clone())
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> CacheEntry {
        CacheEntry::new(
            CacheKey::from_bytes([7; 32]),
            TaskIdentity::new("compile", ":app:compile"),
            OutputSet::new().with("classes", b"bytecode".to_vec()).with("log", "ok"),
        )
    }

    #[test]
    fn test_output_set_keeps_insertion_order_and_replaces() {
        let set = OutputSet::new().with("b", "1").with("a", "2").with("b", "3");
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set.get("b"), Some(b"3".as_slice()));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_entry_verify_detects_tampering() {
        let mut entry = sample();
        assert!(entry.verify().is_ok());
        entry.outputs[0].data[0] ^= 0xff;
        assert!(matches!(entry.verify(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_entry_json_encodes_blobs_as_base64() {
        let entry = sample();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outputs"][0]["data"], "Ynl0ZWNvZGU=");
        let back: CacheEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.size_bytes(), 10);
    }
}
