//! Detail-page harvesting: the worker pool behind the crawl.
//!
//! Workers pull items off the shared [`WorkQueue`], fetch and extract the
//! lot's detail page, and push exactly one [`OutputRecord`] per item into
//! the [`ResultSet`] before marking the item done.

mod types;

pub use types::{DetailStrategy, HarvestConfig, HarvestStats, HarvestSummary};

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::results::ResultSet;
use super::snapshot::Snapshotter;
use crate::models::{ExtractedRecord, OutputRecord, WorkItem};
use crate::scrapers::extract::{iframe_source, AttributeSource, ListGroup};
use crate::scrapers::{resolve_url, Document, Extractor, Fetcher};
use crate::storage::RejectedLog;
use crate::work_queue::WorkQueue;

/// Turns one work item into one output record. Never fails.
pub struct Harvester {
    fetcher: Arc<Fetcher>,
    extractor: Extractor,
    strategy: DetailStrategy,
    rejected: Option<Arc<RejectedLog>>,
}

impl Harvester {
    pub fn new(fetcher: Arc<Fetcher>, extractor: Extractor, strategy: DetailStrategy) -> Self {
        Self {
            fetcher,
            extractor,
            strategy,
            rejected: None,
        }
    }

    /// Record items that yield nothing in `log`.
    pub fn with_rejected_log(mut self, log: Arc<RejectedLog>) -> Self {
        self.rejected = Some(log);
        self
    }

    pub fn strategy(&self) -> DetailStrategy {
        self.strategy
    }

    async fn reject(&self, item: &WorkItem) {
        if let Some(log) = &self.rejected {
            log.record(item).await;
        }
    }

    /// Seed fields plus whatever the description gives up.
    async fn degraded(&self, item: &WorkItem) -> OutputRecord {
        let fallback = self.extractor.from_description(item.description());
        if fallback.is_empty() && self.strategy == DetailStrategy::EmbeddedJson {
            self.reject(item).await;
        }
        OutputRecord::degraded(item, &fallback)
    }

    pub async fn process(&self, item: &WorkItem) -> OutputRecord {
        let Some(link) = item.link() else {
            warn!("Work item has no detail link: {:?}", item.fields());
            self.reject(item).await;
            return OutputRecord::error(item);
        };

        let document = match self.fetcher.fetch_detail(link).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Detail page {} unavailable: {}", link, e);
                return self.degraded(item).await;
            }
        };

        match self.strategy {
            DetailStrategy::EmbeddedJson => self.from_embedded(item, &document).await,
            DetailStrategy::IframeListGroup => self.from_iframe(item, &document).await,
        }
    }

    async fn from_embedded(&self, item: &WorkItem, document: &Document) -> OutputRecord {
        match self.extractor.extract_embedded(document, item.description()) {
            Ok(extracted) => OutputRecord::complete(item, &extracted),
            Err(e) => {
                debug!("No structured data on {}: {}", document.url, e);
                self.degraded(item).await
            }
        }
    }

    async fn from_iframe(&self, item: &WorkItem, document: &Document) -> OutputRecord {
        let Some(src) = iframe_source(&document.body) else {
            debug!("No description iframe on {}", document.url);
            return OutputRecord::degraded(item, &ExtractedRecord::default());
        };
        let src = resolve_url(&document.url, &src);

        let frame = match self.fetcher.fetch_detail(&src).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Description iframe {} unavailable: {}", src, e);
                return OutputRecord::degraded(item, &ExtractedRecord::default());
            }
        };

        let list = ListGroup::parse(&frame.body);
        if list.is_empty() {
            self.reject(item).await;
            return OutputRecord::degraded(item, &ExtractedRecord::default());
        }

        let extracted = self.extractor.extract_from(&[&list as &dyn AttributeSource]);
        OutputRecord::complete(item, &extracted)
    }
}

/// State shared by every worker task.
struct WorkerContext {
    harvester: Arc<Harvester>,
    queue: Arc<WorkQueue<WorkItem>>,
    results: Arc<ResultSet>,
    snapshotter: Option<Arc<Snapshotter>>,
    stats: Arc<HarvestStats>,
    snapshot_every: usize,
}

/// Long-lived workers draining a shared queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stats: Arc<HarvestStats>,
}

impl WorkerPool {
    /// Spawn `config.workers` tasks. They run until the queue is closed or
    /// `shutdown` turns true.
    pub fn spawn(
        harvester: Arc<Harvester>,
        queue: Arc<WorkQueue<WorkItem>>,
        results: Arc<ResultSet>,
        snapshotter: Option<Arc<Snapshotter>>,
        config: &HarvestConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let stats = Arc::new(HarvestStats::default());
        let ctx = Arc::new(WorkerContext {
            harvester,
            queue,
            results,
            snapshotter,
            stats: stats.clone(),
            snapshot_every: config.snapshot_every,
        });

        let workers = config.workers.max(1);
        let handles = (0..workers)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, ctx.clone(), shutdown.clone())))
            .collect();

        info!("Started {} workers", workers);
        Self { handles, stats }
    }

    pub fn stats(&self) -> &Arc<HarvestStats> {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) -> HarvestSummary {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }
        self.stats.summary()
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone without a stop request; rely on queue closure.
        std::future::pending::<()>().await;
    }
}

/// Process `item` on its own task so a panic costs one error record
/// instead of the worker.
async fn process_isolated(harvester: &Arc<Harvester>, item: &WorkItem) -> OutputRecord {
    let task = tokio::spawn({
        let harvester = harvester.clone();
        let item = item.clone();
        async move { harvester.process(&item).await }
    });

    match task.await {
        Ok(record) => record,
        Err(e) => {
            error!(
                "Processing {} failed: {}",
                item.link().unwrap_or("<no link>"),
                e
            );
            harvester.reject(item).await;
            OutputRecord::error(item)
        }
    }
}

async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let handle = tokio::select! {
            handle = ctx.queue.get() => match handle {
                Some(handle) => handle,
                None => break,
            },
            _ = shutdown_requested(&mut shutdown) => break,
        };

        let record = process_isolated(&ctx.harvester, handle.item()).await;
        let crawled = ctx.stats.record(record.status());
        ctx.results.push(record);

        if ctx.snapshot_every > 0 && crawled % ctx.snapshot_every == 0 {
            if let Some(snapshotter) = &ctx.snapshotter {
                if let Err(e) = snapshotter.persist(&ctx.results).await {
                    warn!("Periodic snapshot failed: {}", e);
                }
            }
        }

        handle.complete();
        info!(
            "Queue: {} || Crawled: {}",
            ctx.queue.unfinished(),
            crawled
        );
    }
    debug!("Worker {} stopping", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::tempdir;

    use crate::models::RecordStatus;
    use crate::scrapers::{FetchConfig, FetchError, FetchRequest, Transport};

    /// Serves fixed bodies by URL; unknown URLs get a 404.
    struct PageMap(HashMap<String, String>);

    #[async_trait]
    impl Transport for PageMap {
        async fn get(&self, request: &FetchRequest<'_>) -> Result<Document, FetchError> {
            Ok(match self.0.get(request.url) {
                Some(body) => Document::new(request.url, 200, body.clone()),
                None => Document::new(request.url, 404, ""),
            })
        }
    }

    fn harvester(pages: &[(&str, &str)], strategy: DetailStrategy) -> Harvester {
        let map = pages
            .iter()
            .map(|(u, b)| (u.to_string(), b.to_string()))
            .collect();
        let fetcher = Fetcher::new(
            Arc::new(PageMap(map)),
            FetchConfig {
                retry_delay: Duration::ZERO,
                ..Default::default()
            },
        );
        Harvester::new(
            Arc::new(fetcher),
            Extractor::with_year_range(1940, 2026),
            strategy,
        )
    }

    const DETAIL_WITH_IFRAME: &str =
        r#"<html><body><iframe id="desc_ifr" src="/desc/1"></iframe></body></html>"#;
    const IFRAME_BODY: &str = r#"<div class="container"><ul class="list-group">
        <li>Year: 2012</li><li>Make: Deere</li><li>Model: 310SK</li><li>Hours: 4,100</li>
        </ul></div>"#;

    #[tokio::test]
    async fn test_missing_link_is_error_record() {
        let dir = tempdir().unwrap();
        let log = Arc::new(RejectedLog::new(dir.path().join("rejected.json")));
        let harvester = harvester(&[], DetailStrategy::EmbeddedJson).with_rejected_log(log.clone());

        let item = WorkItem::from_pairs([("price", "$5"), ("date", "2023-09-08")]);
        let record = harvester.process(&item).await;

        assert_eq!(record.status(), RecordStatus::Error);
        assert_eq!(record.get("year"), Some(""));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_absent_page_degrades_to_description() {
        let harvester = harvester(&[], DetailStrategy::EmbeddedJson);
        let item = WorkItem::from_pairs([
            ("link", "https://lots.example/404"),
            ("desc", "2014 Bobcat T650 Track Loader"),
        ]);

        let record = harvester.process(&item).await;

        assert_eq!(record.status(), RecordStatus::Degraded);
        assert_eq!(record.get("year"), Some("2014"));
        assert_eq!(record.get("make"), Some("Bobcat"));
        assert_eq!(record.get("model"), Some("T650"));
        assert_eq!(record.get("hours"), Some(""));
    }

    #[tokio::test]
    async fn test_iframe_list_group() {
        let harvester = harvester(
            &[
                ("https://lots.example/itm/1", DETAIL_WITH_IFRAME),
                ("https://lots.example/desc/1", IFRAME_BODY),
            ],
            DetailStrategy::IframeListGroup,
        );
        let item = WorkItem::from_pairs([("link", "https://lots.example/itm/1"), ("year", "1999")]);

        let record = harvester.process(&item).await;

        assert_eq!(record.status(), RecordStatus::Complete);
        assert_eq!(record.get("year"), Some("2012"));
        assert_eq!(record.get("make"), Some("Deere"));
        assert_eq!(record.get("model"), Some("310SK"));
        assert_eq!(record.get("hours"), Some("4,100"));
    }

    #[tokio::test]
    async fn test_iframe_missing_keeps_seed() {
        let harvester = harvester(
            &[("https://lots.example/itm/2", "<html><body>no frame</body></html>")],
            DetailStrategy::IframeListGroup,
        );
        let item = WorkItem::from_pairs([("link", "https://lots.example/itm/2"), ("make", "Cat")]);

        let record = harvester.process(&item).await;

        assert_eq!(record.status(), RecordStatus::Degraded);
        assert_eq!(record.get("make"), Some("Cat"));
        assert_eq!(record.get("model"), Some(""));
    }

    #[tokio::test]
    async fn test_empty_list_group_is_rejected() {
        let dir = tempdir().unwrap();
        let log = Arc::new(RejectedLog::new(dir.path().join("rejected.json")));
        let harvester = harvester(
            &[
                ("https://lots.example/itm/1", DETAIL_WITH_IFRAME),
                ("https://lots.example/desc/1", "<div class=\"container\"></div>"),
            ],
            DetailStrategy::IframeListGroup,
        )
        .with_rejected_log(log.clone());
        let item = WorkItem::from_pairs([("link", "https://lots.example/itm/1")]);

        let record = harvester.process(&item).await;

        assert_eq!(record.status(), RecordStatus::Degraded);
        assert_eq!(log.items(), vec![item]);
    }

    #[tokio::test]
    async fn test_pool_accounts_for_every_item() {
        let harvester = Arc::new(harvester(&[], DetailStrategy::EmbeddedJson));
        let queue = Arc::new(WorkQueue::new(8));
        let results = Arc::new(ResultSet::new());
        let (tx, rx) = watch::channel(false);
        let pool = WorkerPool::spawn(
            harvester,
            queue.clone(),
            results.clone(),
            None,
            &HarvestConfig {
                workers: 4,
                ..Default::default()
            },
            rx,
        );

        for i in 0..25 {
            let item = if i % 5 == 0 {
                WorkItem::from_pairs([("price", format!("${}", i))])
            } else {
                WorkItem::from_pairs([("link", format!("https://lots.example/{}", i))])
            };
            queue.put(item).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), queue.join())
            .await
            .unwrap();

        assert_eq!(queue.completed(), 25);
        assert_eq!(results.len(), 25);

        tx.send(true).unwrap();
        let summary = tokio::time::timeout(Duration::from_secs(5), pool.join())
            .await
            .unwrap();
        assert_eq!(summary.crawled, 25);
        assert_eq!(summary.errors, 5);
        assert_eq!(summary.degraded, 20);
    }

    /// Panics on any URL ending in `/boom`; everything else is a 404.
    struct PanickingTransport;

    #[async_trait]
    impl Transport for PanickingTransport {
        async fn get(&self, request: &FetchRequest<'_>) -> Result<Document, FetchError> {
            if request.url.ends_with("/boom") {
                panic!("transport blew up on {}", request.url);
            }
            Ok(Document::new(request.url, 404, ""))
        }
    }

    #[tokio::test]
    async fn test_panicking_item_becomes_error_record() {
        let dir = tempdir().unwrap();
        let log = Arc::new(RejectedLog::new(dir.path().join("rejected.json")));
        let fetcher = Fetcher::new(
            Arc::new(PanickingTransport),
            FetchConfig {
                retry_delay: Duration::ZERO,
                ..Default::default()
            },
        );
        let harvester = Arc::new(
            Harvester::new(
                Arc::new(fetcher),
                Extractor::with_year_range(1940, 2026),
                DetailStrategy::EmbeddedJson,
            )
            .with_rejected_log(log.clone()),
        );
        let queue = Arc::new(WorkQueue::new(8));
        let results = Arc::new(ResultSet::new());
        let (tx, rx) = watch::channel(false);
        let pool = WorkerPool::spawn(
            harvester,
            queue.clone(),
            results.clone(),
            None,
            &HarvestConfig {
                workers: 1,
                ..Default::default()
            },
            rx,
        );

        let boom = WorkItem::from_pairs([("link", "https://lots.example/boom")]);
        queue
            .put(WorkItem::from_pairs([
                ("link", "https://lots.example/a"),
                ("desc", "2014 Bobcat T650 Track Loader"),
            ]))
            .await
            .unwrap();
        queue.put(boom.clone()).await.unwrap();
        queue
            .put(WorkItem::from_pairs([
                ("link", "https://lots.example/c"),
                ("desc", "2014 Bobcat T650 Track Loader"),
            ]))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), queue.join())
            .await
            .unwrap();

        assert_eq!(queue.completed(), 3);
        let records = results.snapshot();
        assert_eq!(records.len(), 3);
        let failed: Vec<_> = records
            .iter()
            .filter(|r| r.status() == RecordStatus::Error)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].get("link"), Some("https://lots.example/boom"));
        assert_eq!(log.items(), vec![boom]);

        tx.send(true).unwrap();
        let summary = tokio::time::timeout(Duration::from_secs(5), pool.join())
            .await
            .unwrap();
        assert_eq!(summary.crawled, 3);
        assert_eq!(summary.errors, 1);
    }
}
