//! Crawl orchestration.
//!
//! A run walks `FETCH_LISTING -> ENQUEUE_ITEMS -> AWAIT_DRAIN ->
//! RECONCILE+PERSIST` once per listing page (or once for a fixed seed
//! batch), feeding a pool of long-lived workers.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use super::harvest::{HarvestConfig, HarvestSummary, Harvester, WorkerPool};
use super::results::ResultSet;
use super::snapshot::Snapshotter;
use crate::models::{keys, WorkItem};
use crate::scrapers::{resolve_url, FetchError, Fetcher, ListingPage};
use crate::storage::StorageError;
use crate::work_queue::{WorkQueue, WorkQueueError};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("first listing page unavailable: {0}")]
    Listing(#[from] FetchError),
    #[error("work queue error: {0}")]
    Queue(#[from] WorkQueueError),
    #[error("failed to write snapshot: {0}")]
    Storage(#[from] StorageError),
}

/// Listing site to paginate.
#[derive(Debug, Clone)]
pub struct ListingTarget {
    pub base_url: String,
    pub keyword: String,
    /// Stop after this many pages even if the site reports more.
    pub max_pages: Option<u32>,
}

impl ListingTarget {
    /// Query for `page`. The first page is requested bare.
    pub fn params(&self, page: u32) -> Vec<(String, String)> {
        if page <= 1 {
            return Vec::new();
        }
        vec![
            ("pageNumber".to_string(), page.to_string()),
            ("keyword".to_string(), self.keyword.clone()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages: u32,
    pub items: usize,
    pub records_written: usize,
    pub harvest: HarvestSummary,
}

pub struct CrawlDriver {
    fetcher: Arc<Fetcher>,
    harvester: Arc<Harvester>,
    snapshotter: Arc<Snapshotter>,
    config: HarvestConfig,
    queue_capacity: usize,
}

/// Workers and queue for one run.
struct Session {
    queue: Arc<WorkQueue<WorkItem>>,
    results: Arc<ResultSet>,
    shutdown: watch::Sender<bool>,
    pool: WorkerPool,
}

impl Session {
    async fn finish(self) -> HarvestSummary {
        self.queue.close();
        let _ = self.shutdown.send(true);
        self.pool.join().await
    }
}

impl CrawlDriver {
    pub fn new(
        fetcher: Arc<Fetcher>,
        harvester: Arc<Harvester>,
        snapshotter: Arc<Snapshotter>,
        config: HarvestConfig,
        queue_capacity: usize,
    ) -> Self {
        Self {
            fetcher,
            harvester,
            snapshotter,
            config,
            queue_capacity,
        }
    }

    pub fn snapshotter(&self) -> &Arc<Snapshotter> {
        &self.snapshotter
    }

    fn start(&self) -> Session {
        let queue = Arc::new(WorkQueue::new(self.queue_capacity));
        let results = Arc::new(ResultSet::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let pool = WorkerPool::spawn(
            self.harvester.clone(),
            queue.clone(),
            results.clone(),
            Some(self.snapshotter.clone()),
            &self.config,
            shutdown_rx,
        );
        Session {
            queue,
            results,
            shutdown,
            pool,
        }
    }

    /// Enqueue one batch, wait for it to drain, then fold it into the
    /// accumulated output. Returns the number of rows written.
    async fn process_batch(
        &self,
        session: &Session,
        items: Vec<WorkItem>,
    ) -> Result<usize, CrawlError> {
        self.snapshotter.begin_batch(items.clone()).await;
        for item in items {
            session.queue.put(item).await?;
        }
        session.queue.join().await;
        Ok(self.snapshotter.finish_batch(&session.results).await?)
    }

    /// Crawl every listing page of `target`.
    ///
    /// The first page must load, since it carries the page count; a later
    /// page that exhausts its retries is logged and skipped.
    pub async fn run_listing(&self, target: &ListingTarget) -> Result<CrawlSummary, CrawlError> {
        let session = self.start();
        let outcome = self.walk_pages(&session, target).await;
        let harvest = session.finish().await;

        let mut summary = outcome?;
        summary.harvest = harvest;
        info!(
            "Crawl finished: {} pages, {} items, {} records",
            summary.pages, summary.items, summary.records_written
        );
        Ok(summary)
    }

    async fn walk_pages(
        &self,
        session: &Session,
        target: &ListingTarget,
    ) -> Result<CrawlSummary, CrawlError> {
        let mut summary = CrawlSummary::default();
        let mut total_pages = 1;
        let mut page = 1;

        loop {
            info!("Fetching equipments from page: {}", page);
            let listing = match self
                .fetcher
                .fetch_listing(&target.base_url, &target.params(page))
                .await
            {
                Ok(doc) => Some(ListingPage::parse(&doc.body)),
                Err(e) if page == 1 => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping listing page {}: {}", page, e);
                    None
                }
            };

            if let Some(listing) = listing {
                if page == 1 {
                    total_pages = match target.max_pages {
                        Some(max) => listing.total_pages.min(max.max(1)),
                        None => listing.total_pages,
                    };
                    info!("{} listing pages to crawl", total_pages);
                }

                let items: Vec<WorkItem> = listing
                    .items
                    .into_iter()
                    .map(|item| absolutize(item, &target.base_url))
                    .collect();
                summary.items += items.len();
                summary.records_written = self.process_batch(session, items).await?;
            }
            summary.pages = page;

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(summary)
    }

    /// Process a fixed seed set as a single batch.
    pub async fn run_batch(&self, seed: Vec<WorkItem>) -> Result<CrawlSummary, CrawlError> {
        let items = seed.len();
        let session = self.start();
        let outcome = self.process_batch(&session, seed).await;
        let harvest = session.finish().await;

        let records_written = outcome?;
        info!("Finished! {} of {} items written", records_written, items);
        Ok(CrawlSummary {
            pages: 1,
            items,
            records_written,
            harvest,
        })
    }
}

fn absolutize(item: WorkItem, base_url: &str) -> WorkItem {
    let resolved = item.link().map(|link| resolve_url(base_url, link));
    match resolved {
        Some(link) => item.with(keys::LINK, link),
        None => item,
    }
}
