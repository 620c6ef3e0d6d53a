//! Wire format for cache entries.
//!
//! ```text
//! b"CAIRN" | format version (u8) | compression tag (u8) | payload
//! ```
//!
//! The payload is the JSON form of a [`CacheEntry`], compressed with the
//! tagged algorithm. The same bytes are written to local store files and
//! sent as HTTP bodies.

use crate::entry::CacheEntry;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const MAGIC: &[u8; 5] = b"CAIRN";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Compression applied to the entry payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Zstd,
    Gzip,
}

impl Compression {
    fn tag(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Zstd => 1,
            Compression::Gzip => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Zstd),
            2 => Ok(Compression::Gzip),
            other => Err(Error::Protocol(format!("unknown compression tag {other}"))),
        }
    }
}

/// Encodes and decodes entries in the cairn wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryCodec {
    compression: Compression,
    max_decoded_bytes: Option<usize>,
}

impl EntryCodec {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            max_decoded_bytes: None,
        }
    }

    /// Reject payloads that decompress to more than `limit` bytes. Bounds
    /// what an untrusted body can expand to, whatever its size on the wire.
    pub fn with_max_decoded_bytes(mut self, limit: usize) -> Self {
        self.max_decoded_bytes = Some(limit);
        self
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn max_decoded_bytes(&self) -> Option<usize> {
        self.max_decoded_bytes
    }

    pub fn encode(&self, entry: &CacheEntry) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(entry)?;
        let payload = compress(&json, self.compression)?;

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.push(self.compression.tag());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode bytes written by any codec; the compression tag is read from
    /// the header rather than from `self`.
    pub fn decode(&self, bytes: &[u8]) -> Result<CacheEntry> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::Protocol("not a cairn cache entry".into()));
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(Error::Protocol(format!(
                "unsupported entry format version {version}"
            )));
        }
        let compression = Compression::from_tag(bytes[MAGIC.len() + 1])?;
        let json = decompress(&bytes[HEADER_LEN..], compression, self.max_decoded_bytes)?;
        serde_json::from_slice(&json)
            .map_err(|e| Error::Protocol(format!("malformed entry payload: {e}")))
    }
}

fn compress(data: &[u8], algorithm: Compression) -> Result<Vec<u8>> {
    match algorithm {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd => zstd::encode_all(data, 3)
            .map_err(|e| Error::Internal(format!("Zstd compression failed: {}", e))),
        Compression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| Error::Internal(format!("Gzip write failed: {}", e)))?;
            encoder
                .finish()
                .map_err(|e| Error::Internal(format!("Gzip finish failed: {}", e)))
        }
    }
}

fn decompress(data: &[u8], algorithm: Compression, limit: Option<usize>) -> Result<Vec<u8>> {
    match algorithm {
        Compression::None => read_limited(data, limit, "Entry"),
        Compression::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(data)
                .map_err(|e| Error::Protocol(format!("Zstd payload corrupt: {}", e)))?;
            read_limited(decoder, limit, "Zstd")
        }
        Compression::Gzip => read_limited(flate2::read::GzDecoder::new(data), limit, "Gzip"),
    }
}

/// Read at most `limit + 1` bytes so an oversized payload is detected
/// without inflating all of it.
fn read_limited<R: Read>(mut reader: R, limit: Option<usize>, format: &str) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let read = match limit {
        Some(limit) => reader
            .by_ref()
            .take(limit as u64 + 1)
            .read_to_end(&mut output),
        None => reader.read_to_end(&mut output),
    };
    read.map_err(|e| Error::Protocol(format!("{} payload corrupt: {}", format, e)))?;

    match limit {
        Some(limit) if output.len() > limit => Err(Error::Protocol(format!(
            "entry payload exceeds {} bytes once decoded",
            limit
        ))),
        _ => Ok(output),
    }
}
