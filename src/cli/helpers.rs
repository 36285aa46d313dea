//! Shared helper functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use console::style;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{CrawlMode, Settings};
use crate::scrapers::{
    Extractor, Fetcher, HtmlTableSource, ProxyPool, ProxyRefresher, ReqwestTransport, StaticSource,
};
use crate::services::{CrawlDriver, CrawlSummary, HarvestConfig, Harvester, Snapshotter};
use crate::storage::{ensure_output_dir, RejectedLog, SnapshotWriter};

/// Fetcher plus the background proxy refresher feeding it.
pub struct Network {
    pub fetcher: Arc<Fetcher>,
    pub proxies: Option<Arc<ProxyPool>>,
    shutdown: watch::Sender<bool>,
    refresher: Option<JoinHandle<()>>,
}

impl Network {
    /// Build the fetcher for `mode`. With proxies enabled this starts the
    /// refresh loop and waits for the first usable proxy.
    pub async fn start(settings: &Settings, mode: CrawlMode) -> anyhow::Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(settings.request_timeout()));
        let fetcher = Fetcher::new(transport, settings.fetch_config());
        let (shutdown, shutdown_rx) = watch::channel(false);

        if !settings.use_proxies_for(mode) {
            return Ok(Self {
                fetcher: Arc::new(fetcher),
                proxies: None,
                shutdown,
                refresher: None,
            });
        }

        let pool = Arc::new(ProxyPool::new(settings.proxy_pool_config()));
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        let mut refresher = ProxyRefresher::new(pool.clone(), settings.proxy_refresh_interval());
        for url in &settings.proxy_sources {
            refresher = refresher.add_source(Box::new(HtmlTableSource::new(
                url.clone(),
                settings.proxy_rows,
                client.clone(),
            )));
        }
        if !settings.static_proxies.is_empty() {
            refresher =
                refresher.add_source(Box::new(StaticSource::new(settings.static_proxies.clone())));
        }
        tracing::info!("Refreshing proxies from {} sources", refresher.source_count());
        let refresher = refresher.spawn(shutdown_rx);

        let network = Self {
            fetcher: Arc::new(fetcher.with_proxies(pool.clone())),
            proxies: Some(pool.clone()),
            shutdown,
            refresher: Some(refresher),
        };

        println!("{} Waiting for proxies...", style("→").cyan());
        tokio::select! {
            _ = pool.wait_until_ready() => {}
            _ = tokio::signal::ctrl_c() => {
                network.stop().await;
                anyhow::bail!("Interrupted while waiting for proxies");
            }
        }
        println!(
            "{} {} proxies available",
            style("✓").green(),
            pool.len().await
        );

        Ok(network)
    }

    /// Signal the refresh loop to stop and wait for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.refresher {
            if let Err(e) = handle.await {
                tracing::warn!("Proxy refresher ended abnormally: {}", e);
            }
        }
    }
}

/// Validate the output directory and open the snapshot target and the
/// rejected-item file. Runs before any worker starts.
pub fn prepare_output(
    settings: &Settings,
    mode: CrawlMode,
) -> anyhow::Result<(Arc<Snapshotter>, Arc<RejectedLog>)> {
    ensure_output_dir(&settings.output_dir)?;

    let today = chrono::Local::now().date_naive();
    let writer = SnapshotWriter::new(
        &settings.output_dir,
        settings.snapshot_filename(mode, today),
    );
    let rejected = RejectedLog::new(settings.rejected_path());
    if let Some(parent) = rejected.path().parent() {
        if !parent.as_os_str().is_empty() {
            ensure_output_dir(parent)?;
        }
    }

    Ok((Arc::new(Snapshotter::new(writer)), Arc::new(rejected)))
}

/// Wire the harvester and worker configuration for `mode`.
pub fn build_driver(
    settings: &Settings,
    mode: CrawlMode,
    fetcher: Arc<Fetcher>,
    snapshotter: Arc<Snapshotter>,
    rejected: Arc<RejectedLog>,
) -> CrawlDriver {
    let harvester = Harvester::new(fetcher.clone(), Extractor::new(), mode.strategy())
        .with_rejected_log(rejected);
    let config = HarvestConfig {
        workers: settings.workers_for(mode),
        snapshot_every: settings.snapshot_every,
    };
    CrawlDriver::new(
        fetcher,
        Arc::new(harvester),
        snapshotter,
        config,
        settings.queue_capacity,
    )
}

pub fn print_summary(summary: &CrawlSummary, snapshot: &Path, rejected: &RejectedLog) {
    let harvest = &summary.harvest;
    println!(
        "{} {} records written to {}",
        style("✓").green(),
        summary.records_written,
        snapshot.display()
    );
    println!(
        "  {} complete, {} degraded, {} errors ({} items from {} pages)",
        harvest.complete, harvest.degraded, harvest.errors, summary.items, summary.pages
    );
    if !rejected.is_empty() {
        println!(
            "{} {} items rejected, see {}",
            style("!").yellow(),
            rejected.len(),
            rejected.path().display()
        );
    }
}
