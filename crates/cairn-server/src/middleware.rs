//! HTTP middleware for the cache server.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use cairn_trace::request_span;
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, OnResponse, TraceLayer};
use tracing::Span;
use uuid::Uuid;

const REQUEST_ID: &str = "x-request-id";

/// Inject a request ID into each request and echo it on the response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    if let Some(id) = &id {
        request.headers_mut().insert(REQUEST_ID, id.clone());
    }
    let mut response = next.run(request).await;
    if let Some(id) = id {
        response.headers_mut().insert(REQUEST_ID, id);
    }
    response
}

/// Opens a [`request_span`] per request, keyed by the path's cache key.
#[derive(Debug, Clone, Copy)]
pub struct CacheRequestSpan;

impl<B> MakeSpan<B> for CacheRequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let key = request.uri().path().trim_start_matches('/');
        request_span(request.method().as_str(), key)
    }
}

/// Records the status on the request span and logs completion.
#[derive(Debug, Clone, Copy)]
pub struct RecordStatus;

impl<B> OnResponse<B> for RecordStatus {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status().as_u16();
        span.record("http.status", status);
        tracing::info!(
            parent: span,
            status,
            latency_ms = latency.as_millis() as u64,
            "Request finished"
        );
    }
}

pub type CacheTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    CacheRequestSpan,
    tower_http::trace::DefaultOnRequest,
    RecordStatus,
>;

/// Tracing layer for every cache request.
pub fn trace_layer() -> CacheTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(CacheRequestSpan)
        .on_response(RecordStatus)
}
