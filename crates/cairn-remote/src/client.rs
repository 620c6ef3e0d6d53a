//! HTTP(S) client for the remote cache protocol.
//!
//! `GET /{key}` pulls an entry (`404` is a miss), `PUT /{key}` pushes one.

use crate::config::{RemoteConfig, TlsConfig};
use crate::retry::{AttemptError, RetryPolicy, retry_with_backoff};
use async_trait::async_trait;
use bytes::Bytes;
use cairn_core::{CacheEntry, CacheKey, CacheTier, EntryCodec, Error, PutOutcome, Result};
use reqwest::{Client, StatusCode, header};
use tracing::debug;
use url::Url;

const ENTRY_CONTENT_TYPE: &str = "application/vnd.cairn.entry";

/// Client for a remote cache server.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: Url,
    push_enabled: bool,
    retry: RetryPolicy,
    codec: EntryCodec,
}

impl RemoteClient {
    /// Build a client from configuration, loading any TLS material.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("cairn/", env!("CARGO_PKG_VERSION")));

        if config.is_tls() {
            builder = apply_tls(builder, &config.tls)?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            push_enabled: config.push,
            retry: RetryPolicy::from_config(config),
            codec: EntryCodec::default().with_max_decoded_bytes(config.max_entry_bytes),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    fn entry_url(&self, key: &CacheKey) -> Result<Url> {
        self.base_url
            .join(&key.to_hex())
            .map_err(|e| Error::Internal(format!("Failed to build entry URL: {}", e)))
    }

    /// Fetch the serialized entry for `key`. `Ok(None)` is a miss.
    pub async fn pull(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let url = self.entry_url(key)?;
        let found = retry_with_backoff(&self.retry, "pull", || {
            let request = self.client.get(url.clone());
            async move {
                let response = request.send().await.map_err(classify_request_error)?;
                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !status.is_success() {
                    return Err(classify_status(status));
                }
                let body = response.bytes().await.map_err(classify_request_error)?;
                Ok(Some(body.to_vec()))
            }
        })
        .await?;

        debug!(%key, hit = found.is_some(), "Remote pull finished");
        Ok(found)
    }

    /// Upload a serialized entry. A no-op reporting `Skipped` when pushing is
    /// disabled.
    pub async fn push(&self, key: &CacheKey, body: Vec<u8>) -> Result<PutOutcome> {
        if !self.push_enabled {
            debug!(%key, "Remote push disabled, skipping");
            return Ok(PutOutcome::Skipped);
        }

        let url = self.entry_url(key)?;
        let body = Bytes::from(body);
        let size = body.len();
        let outcome = retry_with_backoff(&self.retry, "push", || {
            let request = self
                .client
                .put(url.clone())
                .header(header::CONTENT_TYPE, ENTRY_CONTENT_TYPE)
                .body(body.clone());
            async move {
                let response = request.send().await.map_err(classify_request_error)?;
                match response.status() {
                    StatusCode::CREATED => Ok(PutOutcome::Stored),
                    status if status.is_success() => Ok(PutOutcome::AlreadyPresent),
                    status => Err(classify_status(status)),
                }
            }
        })
        .await?;

        debug!(%key, bytes = size, ?outcome, "Remote push finished");
        Ok(outcome)
    }

    /// Check whether the remote holds `key` without downloading it.
    pub async fn exists(&self, key: &CacheKey) -> Result<bool> {
        let url = self.entry_url(key)?;
        retry_with_backoff(&self.retry, "exists", || {
            let request = self.client.head(url.clone());
            async move {
                let response = request.send().await.map_err(classify_request_error)?;
                match response.status() {
                    StatusCode::NOT_FOUND => Ok(false),
                    status if status.is_success() => Ok(true),
                    status => Err(classify_status(status)),
                }
            }
        })
        .await
    }
}

#[async_trait]
impl CacheTier for RemoteClient {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let Some(bytes) = self.pull(key).await? else {
            return Ok(None);
        };
        let entry = self.codec.decode(&bytes)?;
        if entry.key != *key {
            return Err(Error::Protocol(format!(
                "remote returned entry {} for key {}",
                entry.key, key
            )));
        }
        entry.verify()?;
        Ok(Some(entry))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<PutOutcome> {
        if !self.push_enabled {
            return Ok(PutOutcome::Skipped);
        }
        let body = self.codec.encode(entry)?;
        self.push(&entry.key, body).await
    }
}

fn apply_tls(
    mut builder: reqwest::ClientBuilder,
    tls: &TlsConfig,
) -> Result<reqwest::ClientBuilder> {
    if let Some(ca) = &tls.ca_cert {
        let pem = read_pem(ca)?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| Error::Config(format!("invalid CA certificate {}: {}", ca.display(), e)))?;
        builder = builder.add_root_certificate(cert);
    }

    match (&tls.client_cert, &tls.client_key) {
        (Some(cert), Some(key)) => {
            let mut pem = read_pem(cert)?;
            pem.push(b'\n');
            pem.extend(read_pem(key)?);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| Error::Config(format!("invalid client identity: {}", e)))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(Error::Config(
                "remote.tls.client_cert and remote.tls.client_key must be set together".into(),
            ));
        }
    }

    if tls.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }
    Ok(builder)
}

fn read_pem(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))
}

fn classify_request_error(err: reqwest::Error) -> AttemptError {
    if err.is_builder() || err.is_redirect() {
        AttemptError::Permanent(err.to_string())
    } else {
        AttemptError::Transient(err.to_string())
    }
}

fn classify_status(status: StatusCode) -> AttemptError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        AttemptError::Transient(format!("server returned {status}"))
    } else {
        AttemptError::Permanent(format!("server returned {status}"))
    }
}
