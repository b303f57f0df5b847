//! TestServer: serves a generated router on a random local port.

use std::net::SocketAddr;
use std::sync::Arc;

use oasgen_runtime::Service;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::petstore;
use crate::store::{MemoryStore, StaticCredentials};

/// Errors from TestServer operations.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Full-stack test harness.
///
/// Runs a [`Service`] behind the runtime's HTTP/1 loop and provides
/// request helpers. The server task stops when the harness is dropped.
pub struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Serve `service` on an OS-assigned port.
    pub async fn start(service: Service) -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = oasgen_runtime::serve::serve(listener, service).await {
                eprintln!("test server stopped: {e}");
            }
        });

        Ok(Self {
            addr,
            client: reqwest::Client::new(),
            task,
        })
    }

    /// The petstore router backed by `store`, guarded by `credentials`.
    ///
    /// With `None` the security middleware lets every request through.
    pub async fn petstore(
        store: Arc<MemoryStore>,
        credentials: Option<StaticCredentials>,
    ) -> Result<Self, TestError> {
        let mut router = petstore::server::router(store);
        router.middleware(petstore::security::middleware(credentials));
        Self::start(router.build()).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request to the given path.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, TestError> {
        self.request(reqwest::Method::GET, path, &[], None).await
    }

    /// Make a request with any method, extra headers and an optional JSON body.
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, TestError> {
        let url = format!("{}{}", self.base_url(), path);
        let mut request = self.client.request(method, &url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
