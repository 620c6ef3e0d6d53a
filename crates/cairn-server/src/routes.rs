//! Route definitions.

use axum::{Router, extract::DefaultBodyLimit, middleware, routing::get};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{entries, health};
use crate::middleware::{request_id, trace_layer};
use crate::state::AppState;

/// Create the cache server router.
///
/// `AppState::max_entry_bytes` bounds uploads: larger bodies are answered
/// with `413`, and bodies that decompress past it with `400`. Nothing is
/// stored in either case.
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_entry_bytes = state.max_entry_bytes;
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/{key}",
            get(entries::get_entry)
                .head(entries::head_entry)
                .put(entries::put_entry),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_entry_bytes))
        .layer(middleware::from_fn(request_id))
        .layer(trace_layer())
        .with_state(state)
}
