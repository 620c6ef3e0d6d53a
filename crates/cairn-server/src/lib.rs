//! Remote cache server for cairn.
//!
//! Serves `GET`/`HEAD`/`PUT /{key}` over HTTP or HTTPS, backed by the same
//! directory store the build-side cache uses, so uploads are atomic and
//! corrupt entries read as misses.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod tls;

pub use config::{ServerConfig, ServerTlsConfig};
pub use routes::create_router;
pub use server::CacheServer;
pub use state::AppState;
