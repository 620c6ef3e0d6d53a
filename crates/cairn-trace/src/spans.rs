//! Span creation for cache operations.

use tracing::{Level, Span, span};

/// Create a span for a coordinator operation on one cache key.
pub fn cache_span(operation: &str, key: &str) -> Span {
    span!(
        Level::DEBUG,
        "cache.operation",
        operation = operation,
        cache.key = key,
    )
}

/// Create a span for a remote cache server request.
pub fn request_span(method: &str, key: &str) -> Span {
    span!(
        Level::INFO,
        "cache.request",
        http.method = method,
        cache.key = key,
        http.status = tracing::field::Empty,
    )
}
