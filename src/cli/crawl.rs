//! Listing-site crawl command.

use crate::config::{CrawlMode, Settings};
use crate::services::ListingTarget;

use super::helpers::{build_driver, prepare_output, print_summary, Network};

/// Paginate the listing site and harvest every lot on it.
pub async fn cmd_crawl(
    settings: &Settings,
    keyword: Option<String>,
    max_pages: Option<u32>,
) -> anyhow::Result<()> {
    let mode = CrawlMode::Crawl;
    settings.validate(mode)?;
    let (snapshotter, rejected) = prepare_output(settings, mode)?;

    let target = ListingTarget {
        base_url: settings.base_url.clone(),
        keyword: keyword.unwrap_or_else(|| settings.keyword.clone()),
        max_pages,
    };
    tracing::info!(
        base_url = %target.base_url,
        keyword = %target.keyword,
        workers = settings.workers_for(mode),
        "Starting crawl"
    );

    let network = Network::start(settings, mode).await?;
    let driver = build_driver(
        settings,
        mode,
        network.fetcher.clone(),
        snapshotter.clone(),
        rejected.clone(),
    );

    let outcome = driver.run_listing(&target).await;
    network.stop().await;
    let summary = outcome?;

    print_summary(&summary, snapshotter.writer().path(), &rejected);
    Ok(())
}
