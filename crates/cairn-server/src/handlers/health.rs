//! Health check handler.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub entries: Option<u64>,
    pub bytes: Option<u64>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.store.clone();
    let usage = tokio::task::spawn_blocking(move || store.usage())
        .await
        .ok()
        .and_then(|usage| usage.ok());

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entries: usage.map(|u| u.entries),
        bytes: usage.map(|u| u.bytes),
    })
}
