//! Application state shared across handlers.

use cairn_core::EntryCodec;
use cairn_store::LocalStore;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: LocalStore,
    /// Encodes response bodies and decodes uploads, capped at
    /// `max_entry_bytes` once decompressed.
    pub codec: EntryCodec,
    /// Upper bound on an upload, both on the wire and decoded.
    pub max_entry_bytes: usize,
}

impl AppState {
    pub fn new(store: LocalStore, codec: EntryCodec, max_entry_bytes: usize) -> Self {
        Self {
            store,
            codec: codec.with_max_decoded_bytes(max_entry_bytes),
            max_entry_bytes,
        }
    }
}
