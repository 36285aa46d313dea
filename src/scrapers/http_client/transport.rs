//! Raw HTTP transport used by the fetcher.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::debug;

use super::response::Document;
use super::FetchError;

/// One GET request.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub params: &'a [(String, String)],
    /// `host:port` (or a full proxy URL) to route through.
    pub proxy: Option<&'a str>,
    pub headers: &'a [(String, String)],
}

/// Performs a single request attempt. Retry and proxy policy live in
/// [`super::Fetcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &FetchRequest<'_>) -> Result<Document, FetchError>;

    /// Drop any per-proxy state once `proxy` is banned.
    fn forget_proxy(&self, _proxy: &str) {}
}

/// reqwest-backed transport. Keeps one client per proxy so connection
/// pools are reused across attempts.
pub struct ReqwestTransport {
    timeout: Duration,
    accept_invalid_certs: bool,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            accept_invalid_certs: true,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Enforce certificate validation (relaxed by default for legacy
    /// endpoints and intercepting proxies).
    pub fn with_strict_tls(mut self) -> Self {
        self.accept_invalid_certs = false;
        self
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, FetchError> {
        let key = proxy.map(|p| p.to_string());
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .timeout(self.timeout)
            .gzip(true)
            .brotli(true)
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy_url(proxy)).map_err(|e| FetchError::Client {
                message: format!("Invalid proxy '{}': {}", proxy, e),
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| FetchError::Client {
            message: format!("Failed to create HTTP client: {}", e),
        })?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

/// Normalize a `host:port` proxy to a URL reqwest accepts.
pub fn proxy_url(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &FetchRequest<'_>) -> Result<Document, FetchError> {
        let client = self.client_for(request.proxy)?;

        let mut builder = client.get(request.url);
        if !request.params.is_empty() {
            builder = builder.query(request.params);
        }
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;

        Ok(Document { url, status, body })
    }

    fn forget_proxy(&self, proxy: &str) {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if clients.remove(&Some(proxy.to_string())).is_some() {
            debug!("Dropped client for banned proxy {}", proxy);
        }
    }
}
