//! Data models for lotcrawl.

mod record;
mod work_item;

pub use record::{ExtractedRecord, Field, OutputRecord, RecordStatus};
pub use work_item::{keys, IdentityKey, WorkItem};
