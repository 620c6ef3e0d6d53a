//! Fixed-length SHA-256 digests: cache keys and content digests.

use crate::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Length in bytes of every digest produced by cairn.
pub const DIGEST_LEN: usize = 32;

macro_rules! define_digest {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; DIGEST_LEN]);

        impl $name {
            pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            /// Parses exactly 64 lowercase hex characters.
            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                if s.len() != DIGEST_LEN * 2 {
                    return Err(Error::InvalidKey(format!(
                        "expected {} hex characters, got {}",
                        DIGEST_LEN * 2,
                        s.len()
                    )));
                }
                if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
                    return Err(Error::InvalidKey(format!("not lowercase hex: {s}")));
                }
                let mut bytes = [0u8; DIGEST_LEN];
                hex::decode_to_slice(s, &mut bytes)
                    .map_err(|e| Error::InvalidKey(e.to_string()))?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

define_digest!(
    /// Deterministic key identifying a task execution's expected output set.
    CacheKey
);

define_digest!(
    /// SHA-256 digest of a file's bytes or of a normalized property value.
    ContentDigest
);

impl ContentDigest {
    /// Digest an in-memory value.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Digest a file by streaming its contents.
    pub fn of_file(path: &Path) -> crate::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }
}

impl CacheKey {
    /// Two-character shard prefix used for on-disk layout.
    pub fn shard(&self) -> String {
        hex::encode(&self.0[..1])
    }
}
