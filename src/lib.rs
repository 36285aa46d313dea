//! lotcrawl - auction listing crawler.
//!
//! Crawls a paginated listing site (or re-cleans a previously exported
//! table), fetches each lot's detail page through a rotating proxy pool,
//! extracts year/make/model/hours and writes order-stable, deduplicated
//! snapshots.

pub mod cli;
pub mod config;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod work_queue;

pub use models::{ExtractedRecord, Field, IdentityKey, OutputRecord, RecordStatus, WorkItem};
pub use scrapers::{Document, Extractor, FetchError, Fetcher, ProxyPool};
pub use work_queue::WorkQueue;
