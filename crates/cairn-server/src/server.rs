//! Listener setup and the serve loop.

use cairn_core::{EntryCodec, Error, Result};
use cairn_store::{EvictionPolicy, LocalStore};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::routes::create_router;
use crate::state::AppState;
use crate::tls::load_server_config;

/// A bound, not yet running, cache server.
pub struct CacheServer {
    listener: TcpListener,
    store: LocalStore,
    router: axum::Router,
    tls: Option<TlsAcceptor>,
    eviction: Option<(EvictionPolicy, Duration)>,
}

impl CacheServer {
    /// Open storage, load TLS material and bind the listener. Every
    /// configuration problem surfaces here.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let directory = config.resolved_directory()?;
        let store = LocalStore::open(&directory, config.compression)?;
        let state = Arc::new(AppState::new(
            store.clone(),
            EntryCodec::new(config.compression),
            config.max_entry_bytes,
        ));
        let router = create_router(state);

        let tls = config
            .tls
            .as_ref()
            .map(|tls| load_server_config(tls).map(TlsAcceptor::from))
            .transpose()?;

        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| Error::Config(format!("cannot listen on {}: {}", config.listen, e)))?;

        info!(
            addr = %listener.local_addr()?,
            directory = %directory.display(),
            tls = tls.is_some(),
            "Cache server bound"
        );

        Ok(Self {
            listener,
            store,
            router,
            tls,
            eviction: config
                .eviction_interval()
                .map(|interval| (config.eviction.clone(), interval)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Serve until `shutdown` completes.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let eviction = self
            .eviction
            .map(|(policy, interval)| spawn_eviction(self.store.clone(), policy, interval));

        let result = match self.tls {
            Some(acceptor) => serve_tls(self.listener, acceptor, self.router, shutdown).await,
            None => axum::serve(self.listener, self.router)
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(Error::from),
        };

        if let Some(handle) = eviction {
            handle.abort();
        }
        info!("Cache server stopped");
        result
    }
}

async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: axum::Router,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
            _ = &mut shutdown => return Ok(()),
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(router.clone());
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    // Includes clients rejected for a missing or untrusted certificate.
                    warn!(%peer, error = %e, "TLS handshake failed");
                    return;
                }
            };
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tls_stream), service)
                .await
            {
                debug!(%peer, error = %e, "Connection closed with error");
            }
        });
    }
}

fn spawn_eviction(store: LocalStore, policy: EvictionPolicy, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so startup stays fast.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let store = store.clone();
            let policy = policy.clone();
            match tokio::task::spawn_blocking(move || store.evict(&policy)).await {
                Ok(Ok(report)) => debug!(
                    removed = report.entries_removed,
                    remaining = report.remaining_entries,
                    "Periodic eviction finished"
                ),
                Ok(Err(e)) => warn!(error = %e, "Periodic eviction failed"),
                Err(e) => warn!(error = %e, "Periodic eviction task panicked"),
            }
        }
    })
}
