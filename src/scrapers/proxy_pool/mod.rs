//! Shared, self-healing proxy pool.
//!
//! The live set is read by every worker, shrunk by workers that observe
//! failures through a proxy, and grown by the single refresh task. All
//! mutation happens under one lock; readers only ever see a copied
//! snapshot, and refreshes fold changes in rather than swapping the set.

mod refresh;
mod sources;

pub use refresh::ProxyRefresher;
pub use sources::{parse_proxy_table, HtmlTableSource, ProxySource, StaticSource};

use std::collections::{HashMap, HashSet};

use rand::seq::IndexedRandom;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

/// `host:port` endpoint.
pub type Proxy = String;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from proxy list {url}")]
    Status { url: String, status: u16 },
    #[error("Proxy list {url} had no usable rows")]
    EmptyTable { url: String },
}

#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Bans never shrink the live set below this many entries.
    pub floor: usize,
    /// Failures observed through a proxy before it is banned.
    pub failure_threshold: u32,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            floor: 20,
            failure_threshold: 1,
        }
    }
}

/// Result of a ban request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    /// Removed from the live set and excluded from future refreshes.
    Banned,
    /// Was already banned; nothing changed.
    AlreadyBanned,
    /// Live set is at its floor; the proxy stays live for now.
    Deferred,
}

/// Counts from folding one refresh cycle into the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
struct PoolState {
    live: Vec<Proxy>,
    live_set: HashSet<Proxy>,
    banned: HashSet<Proxy>,
    failures: HashMap<Proxy, u32>,
}

impl PoolState {
    fn ban(&mut self, proxy: &str, floor: usize) -> BanOutcome {
        if self.banned.contains(proxy) {
            return BanOutcome::AlreadyBanned;
        }
        if self.live_set.contains(proxy) {
            if self.live.len() <= floor {
                return BanOutcome::Deferred;
            }
            self.live_set.remove(proxy);
            self.live.retain(|p| p != proxy);
        }
        self.failures.remove(proxy);
        self.banned.insert(proxy.to_string());
        BanOutcome::Banned
    }
}

pub struct ProxyPool {
    config: ProxyPoolConfig,
    state: RwLock<PoolState>,
    /// Live-set size, for waiters blocked on an empty pool.
    live_count: watch::Sender<usize>,
}

impl ProxyPool {
    pub fn new(config: ProxyPoolConfig) -> Self {
        let (live_count, _) = watch::channel(0);
        Self {
            config,
            state: RwLock::new(PoolState::default()),
            live_count,
        }
    }

    /// Create a pool seeded with `proxies`.
    pub fn with_proxies(config: ProxyPoolConfig, proxies: impl IntoIterator<Item = Proxy>) -> Self {
        let mut state = PoolState::default();
        for proxy in proxies {
            if state.live_set.insert(proxy.clone()) {
                state.live.push(proxy);
            }
        }
        let (live_count, _) = watch::channel(state.live.len());
        Self {
            config,
            state: RwLock::new(state),
            live_count,
        }
    }

    pub fn config(&self) -> &ProxyPoolConfig {
        &self.config
    }

    fn publish_len(&self, len: usize) {
        self.live_count.send_replace(len);
    }

    /// Snapshot of the live set, in insertion order.
    pub async fn current_proxies(&self) -> Vec<Proxy> {
        self.state.read().await.live.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.live.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn banned(&self) -> Vec<Proxy> {
        let mut banned: Vec<Proxy> = self.state.read().await.banned.iter().cloned().collect();
        banned.sort();
        banned
    }

    pub async fn is_banned(&self, proxy: &str) -> bool {
        self.state.read().await.banned.contains(proxy)
    }

    /// Suspend until the live set is non-empty.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.live_count.subscribe();
        // The sender lives in `self`, so the channel can't close under us.
        let _ = rx.wait_for(|n| *n > 0).await;
    }

    /// Pick a live proxy uniformly at random, waiting while the set is empty.
    pub async fn acquire(&self) -> Proxy {
        loop {
            {
                let state = self.state.read().await;
                if let Some(proxy) = state.live.choose(&mut rand::rng()) {
                    return proxy.clone();
                }
            }
            debug!("Proxy pool empty, waiting for refresh");
            self.wait_until_ready().await;
        }
    }

    /// Ban a proxy. Idempotent; deferred while the live set is at its floor.
    pub async fn ban(&self, proxy: &str) -> BanOutcome {
        let mut state = self.state.write().await;
        let outcome = state.ban(proxy, self.config.floor);
        if outcome == BanOutcome::Banned {
            debug!("Banned proxy {} ({} live)", proxy, state.live.len());
            self.publish_len(state.live.len());
        }
        outcome
    }

    /// Record a failed request through `proxy`; bans it once the failure
    /// threshold is reached. Returns the ban outcome if a ban was attempted.
    pub async fn report_failure(&self, proxy: &str) -> Option<BanOutcome> {
        let mut state = self.state.write().await;
        if state.banned.contains(proxy) {
            return Some(BanOutcome::AlreadyBanned);
        }

        let failures = {
            let count = state.failures.entry(proxy.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if failures < self.config.failure_threshold {
            return None;
        }

        let outcome = state.ban(proxy, self.config.floor);
        if outcome == BanOutcome::Banned {
            debug!(
                "Banned proxy {} after {} failures ({} live)",
                proxy,
                failures,
                state.live.len()
            );
            self.publish_len(state.live.len());
        }
        Some(outcome)
    }

    /// Fold newly discovered endpoints into the live set and drop any
    /// banned ones.
    pub async fn merge(&self, discovered: impl IntoIterator<Item = Proxy>) -> MergeStats {
        let mut state = self.state.write().await;
        let mut stats = MergeStats::default();

        for proxy in discovered {
            if state.banned.contains(&proxy) || state.live_set.contains(&proxy) {
                continue;
            }
            state.live_set.insert(proxy.clone());
            state.live.push(proxy);
            stats.added += 1;
        }

        let before = state.live.len();
        let PoolState {
            live,
            live_set,
            banned,
            ..
        } = &mut *state;
        live.retain(|p| !banned.contains(p));
        live_set.retain(|p| !banned.contains(p));
        stats.removed = before - live.len();

        info!("Proxies found: {}", state.live.len());
        self.publish_len(state.live.len());
        stats
    }
}
