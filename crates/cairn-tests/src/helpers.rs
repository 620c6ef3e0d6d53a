//! Test helper functions and utilities.

use cairn_server::{CacheServer, ServerConfig};
use cairn_store::LocalStore;
use reqwest::Client;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A cache server running in-process on an ephemeral port.
///
/// Dropping it stops the server and deletes its storage.
pub struct TestServer {
    pub addr: SocketAddr,
    store: LocalStore,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<cairn_core::Result<()>>>,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The server's own storage, for seeding and inspecting entries.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Stop the server and wait for it to exit.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await??;
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start a cache server for testing and return a handle to it.
pub async fn start_test_server() -> anyhow::Result<TestServer> {
    start_test_server_with(|config| config).await
}

/// Start a cache server with a customized configuration. The listen address
/// and directory are always test-local.
pub async fn start_test_server_with(
    customize: impl FnOnce(ServerConfig) -> ServerConfig,
) -> anyhow::Result<TestServer> {
    let dir = TempDir::new()?;
    let config = customize(ServerConfig::new(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        dir.path(),
    ));

    let server = CacheServer::bind(&config).await?;
    let addr = server.local_addr()?;
    let store = server.store().clone();
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(server.run(async {
        let _ = rx.await;
    }));

    Ok(TestServer {
        addr,
        store,
        shutdown: Some(tx),
        handle: Some(handle),
        _dir: dir,
    })
}

/// A URL on which nothing is listening.
pub fn unreachable_url() -> anyhow::Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// Wait for a condition to become true.
pub async fn wait_for<F, Fut>(
    mut condition: F,
    timeout: Duration,
    interval: Duration,
) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("Condition not met within {:?}", timeout);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Assert that a future completes within a timeout.
pub async fn assert_completes_within<F, T>(future: F, timeout: Duration) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("Future did not complete within timeout")
}
