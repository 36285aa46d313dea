//! Background refresh of the proxy pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{ProxyPool, ProxySource};

/// Periodically pulls every source and folds the results into the pool.
pub struct ProxyRefresher {
    pool: Arc<ProxyPool>,
    sources: Vec<Box<dyn ProxySource>>,
    interval: Duration,
}

impl ProxyRefresher {
    pub fn new(pool: Arc<ProxyPool>, interval: Duration) -> Self {
        Self {
            pool,
            sources: Vec::new(),
            interval,
        }
    }

    pub fn add_source(mut self, source: Box<dyn ProxySource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Run one cycle. A failing source is logged and skipped.
    /// Returns the number of newly added proxies.
    pub async fn refresh_once(&self) -> usize {
        let mut discovered = Vec::new();
        for source in &self.sources {
            match source.fetch().await {
                Ok(proxies) => {
                    info!("{} proxies listed by {}", proxies.len(), source.name());
                    discovered.extend(proxies);
                }
                Err(e) => warn!("Proxy refresh from {} failed: {}", source.name(), e),
            }
        }
        self.pool.merge(discovered).await.added
    }

    /// Refresh every `interval` until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Proxy refresher stopping");
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
