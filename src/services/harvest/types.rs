//! Worker pool configuration and counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::models::RecordStatus;

/// Where a detail page keeps the lot's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetailStrategy {
    /// JSON payload embedded in the page's trailing script, with the
    /// listing description as fallback.
    EmbeddedJson,
    /// `Key: Value` list inside the `desc_ifr` iframe document.
    IframeListGroup,
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub workers: usize,
    /// Persist a snapshot after this many completed records (0 disables).
    pub snapshot_every: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            snapshot_every: 10,
        }
    }
}

/// Running totals across every batch.
#[derive(Debug, Default)]
pub struct HarvestStats {
    crawled: AtomicUsize,
    complete: AtomicUsize,
    degraded: AtomicUsize,
    errors: AtomicUsize,
}

impl HarvestStats {
    /// Count one processed item; returns the new crawled total.
    pub fn record(&self, status: RecordStatus) -> usize {
        let counter = match status {
            RecordStatus::Complete => &self.complete,
            RecordStatus::Degraded => &self.degraded,
            RecordStatus::Error => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.crawled.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn summary(&self) -> HarvestSummary {
        HarvestSummary {
            crawled: self.crawled.load(Ordering::Relaxed),
            complete: self.complete.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`HarvestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub crawled: usize,
    pub complete: usize,
    pub degraded: usize,
    pub errors: usize,
}
