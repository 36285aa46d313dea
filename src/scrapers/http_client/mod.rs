//! Page fetcher with proxy rotation and bounded/unbounded retry.

mod response;
mod transport;
mod user_agent;

pub use response::Document;
pub use transport::{proxy_url, FetchRequest, ReqwestTransport, Transport};
pub use user_agent::{browser_headers, random_user_agent};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::proxy_pool::{BanOutcome, ProxyPool};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("{message}")]
    Client { message: String },
    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

/// How long to keep trying a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Give up with [`FetchError::Exhausted`] after this many attempts.
    Bounded(u32),
    /// Retry on a fresh proxy until the page resolves.
    Unbounded,
}

impl RetryPolicy {
    pub fn from_attempts(attempts: Option<u32>) -> Self {
        match attempts {
            Some(n) => Self::Bounded(n),
            None => Self::Unbounded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Attempts for listing pages (few, must make progress).
    pub listing_attempts: u32,
    /// Attempts for detail pages; `None` retries forever.
    pub detail_attempts: Option<u32>,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            listing_attempts: 10,
            detail_attempts: None,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Fetches pages, optionally through a shared proxy pool.
///
/// A 2xx or 404 response resolves the fetch. Anything else (other status,
/// timeout, connection or TLS failure) counts against the proxy used and
/// the request is retried on a freshly picked proxy with a fresh browser
/// identity.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    proxies: Option<Arc<ProxyPool>>,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self {
            transport,
            proxies: None,
            config,
        }
    }

    /// Route every attempt through a proxy picked from `pool`.
    pub fn with_proxies(mut self, pool: Arc<ProxyPool>) -> Self {
        self.proxies = Some(pool);
        self
    }

    pub fn proxies(&self) -> Option<&Arc<ProxyPool>> {
        self.proxies.as_ref()
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch a listing page (bounded retry).
    pub async fn fetch_listing(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Document, FetchError> {
        self.fetch(url, params, RetryPolicy::Bounded(self.config.listing_attempts))
            .await
    }

    /// Fetch a detail page (unbounded unless configured otherwise).
    pub async fn fetch_detail(&self, url: &str) -> Result<Document, FetchError> {
        self.fetch(
            url,
            &[],
            RetryPolicy::from_attempts(self.config.detail_attempts),
        )
        .await
    }

    pub async fn fetch(
        &self,
        url: &str,
        params: &[(String, String)],
        policy: RetryPolicy,
    ) -> Result<Document, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            // Blocks while the pool is momentarily empty.
            let proxy = match &self.proxies {
                Some(pool) => Some(pool.acquire().await),
                None => None,
            };
            let headers = browser_headers();
            let request = FetchRequest {
                url,
                params,
                proxy: proxy.as_deref(),
                headers: &headers,
            };

            let error = match self.transport.get(&request).await {
                Ok(doc) if doc.is_resolved() => {
                    debug!("Fetched {} (HTTP {}, attempt {})", url, doc.status, attempt);
                    return Ok(doc);
                }
                Ok(doc) => FetchError::Status {
                    url: url.to_string(),
                    status: doc.status,
                },
                Err(e) => e,
            };

            if let (Some(pool), Some(proxy)) = (&self.proxies, proxy.as_deref()) {
                if let Some(BanOutcome::Banned) = pool.report_failure(proxy).await {
                    self.transport.forget_proxy(proxy);
                }
            }

            if let RetryPolicy::Bounded(max) = policy {
                if attempt >= max.max(1) {
                    warn!(
                        "Couldn't retrieve {} after {} attempts: {}",
                        url, attempt, error
                    );
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last_error: error.to_string(),
                    });
                }
            }

            warn!(
                "Couldn't retrieve {} (attempt {}): {}. Retrying...",
                url, attempt, error
            );

            if !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }
    }
}
