//! `GET`/`HEAD`/`PUT /{key}`: the remote cache protocol.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use cairn_core::{CacheKey, CacheTier, Error, PutOutcome};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::state::AppState;

const ENTRY_CONTENT_TYPE: &str = "application/vnd.cairn.entry";

type HandlerError = (StatusCode, String);

fn parse_key(raw: &str) -> Result<CacheKey, HandlerError> {
    raw.parse()
        .map_err(|e: Error| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidKey(_) | Error::Protocol(_) | Error::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn storage_error(key: &CacheKey, err: Error) -> HandlerError {
    error!(%key, error = %err, "Cache storage failure");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
) -> Result<Response, HandlerError> {
    let key = parse_key(&raw_key)?;
    let entry = state
        .store
        .get(&key)
        .await
        .map_err(|e| storage_error(&key, e))?;

    let Some(entry) = entry else {
        debug!(%key, "Entry not found");
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let body = state
        .codec
        .encode(&entry)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, ENTRY_CONTENT_TYPE)], body).into_response())
}

/// Existence check. Reads and verifies the entry like `GET`, so a corrupt
/// file is reported missing (and removed) rather than advertised.
pub async fn head_entry(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let key = parse_key(&raw_key)?;
    match state.store.get(&key).await {
        Ok(Some(_)) => Ok(StatusCode::OK),
        Ok(None) => Ok(StatusCode::NOT_FOUND),
        Err(e) => Err(storage_error(&key, e)),
    }
}

/// Store an uploaded entry. The body must decode, carry the key from the
/// path and pass digest verification; nothing is written otherwise.
pub async fn put_entry(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
    body: Bytes,
) -> Result<StatusCode, HandlerError> {
    let key = parse_key(&raw_key)?;

    let entry = state.codec.decode(&body).map_err(|e| {
        warn!(%key, error = %e, "Rejected malformed entry");
        (status_for(&e), e.to_string())
    })?;
    if entry.key != key {
        warn!(%key, body_key = %entry.key, "Rejected entry uploaded under the wrong key");
        return Err((
            StatusCode::BAD_REQUEST,
            format!("entry key {} does not match path key {}", entry.key, key),
        ));
    }
    entry.verify().map_err(|e| (status_for(&e), e.to_string()))?;

    match state.store.put(&entry).await {
        Ok(PutOutcome::Stored) => {
            debug!(%key, bytes = body.len(), "Stored entry");
            Ok(StatusCode::CREATED)
        }
        Ok(PutOutcome::AlreadyPresent | PutOutcome::Skipped) => Ok(StatusCode::OK),
        Err(e) if status_for(&e).is_client_error() => Err((status_for(&e), e.to_string())),
        Err(e) => Err(storage_error(&key, e)),
    }
}
