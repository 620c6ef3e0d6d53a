//! Remote cache tier for cairn.
//!
//! Talks to a cairn cache server over HTTP(S) with bounded retries. Every
//! failure surfaces as a network error so callers can degrade to local-only
//! operation.

pub mod client;
pub mod config;
mod retry;

pub use client::RemoteClient;
pub use config::{RemoteConfig, TlsConfig};
