//! Re-clean command: re-process an exported table through the proxy pool.

use std::path::Path;

use console::style;

use crate::config::{CrawlMode, Settings};
use crate::storage::load_seed;

use super::helpers::{build_driver, prepare_output, print_summary, Network};

pub async fn cmd_reclean(settings: &Settings, seed_path: &Path) -> anyhow::Result<()> {
    let mode = CrawlMode::Reclean;
    settings.validate(mode)?;

    let seed = load_seed(seed_path)?;
    let (snapshotter, rejected) = prepare_output(settings, mode)?;
    if seed.is_empty() {
        println!(
            "{} {} has no rows, nothing to do",
            style("!").yellow(),
            seed_path.display()
        );
        return Ok(());
    }
    tracing::info!(
        seed = %seed_path.display(),
        rows = seed.len(),
        workers = settings.workers_for(mode),
        "Starting reclean"
    );

    let network = Network::start(settings, mode).await?;
    let driver = build_driver(
        settings,
        mode,
        network.fetcher.clone(),
        snapshotter.clone(),
        rejected.clone(),
    );

    let outcome = driver.run_batch(seed).await;
    network.stop().await;
    let summary = outcome?;

    print_summary(&summary, snapshotter.writer().path(), &rejected);
    Ok(())
}
