//! Integration test infrastructure for cairn.
//!
//! Runs a real cache server in-process on an ephemeral port and builds
//! coordinators wired to it, so cross-crate behaviour is tested over real
//! HTTP and real directories.
//!
//! # Usage
//!
//! ```ignore
//! use cairn_tests::{BuildContext, start_test_server};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = start_test_server().await.unwrap();
//!     let build = BuildContext::with_remote(&server.url(), true).unwrap();
//!     // build.coordinator().try_load(...)
//! }
//! ```

pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::BuildContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,cairn_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
