//! Logging setup for cairn.
//!
//! Subscriber initialisation shared by the CLI and the cache server, plus
//! span constructors so cache operations and server requests carry the
//! cache key in every log line.

pub mod spans;
pub mod tracer;

pub use spans::{cache_span, request_span};
pub use tracer::{LogFormat, TracerError, TracingConfig, init_tracing};
