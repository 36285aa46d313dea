//! Crawl pipeline services.
//!
//! Separated from the CLI so the same pipeline can be driven by tests
//! or another front end.

pub mod crawl;
pub mod harvest;
pub mod reconcile;
pub mod results;
pub mod snapshot;

pub use crawl::{CrawlDriver, CrawlError, CrawlSummary, ListingTarget};
pub use harvest::{DetailStrategy, HarvestConfig, HarvestSummary, Harvester, WorkerPool};
pub use reconcile::{dedup, reconcile, reorder};
pub use results::ResultSet;
pub use snapshot::Snapshotter;
