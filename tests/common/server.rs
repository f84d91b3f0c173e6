//! Test server management.
//!
//! Runs the HTTP boundary in-process on an ephemeral port.

use authlink::http::{self, AppState};
use authlink::service::AuthService;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A test server instance. Shut down on drop.
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<std::io::Result<()>>>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Serve `service` on `127.0.0.1:0` with metrics enabled.
    pub async fn spawn(service: AuthService) -> anyhow::Result<Self> {
        authlink::metrics::init();

        let shutdown = CancellationToken::new();
        let state = AppState {
            service,
            request_timeout: Duration::from_secs(5),
            shutdown: shutdown.clone(),
        };
        let app = http::router(state, true);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(http::serve(listener, app, shutdown.clone()));

        Ok(Self {
            addr,
            shutdown,
            handle: Some(handle),
            client: reqwest::Client::new(),
        })
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting and wait for the server task.
    #[allow(dead_code)]
    pub async fn stop(mut self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle).await???;
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
