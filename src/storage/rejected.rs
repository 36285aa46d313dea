//! Side file of items that yielded nothing, kept for manual review.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use super::{write_atomic, StorageError};
use crate::models::WorkItem;

/// JSON array of seed items, rewritten in full on every append.
#[derive(Debug)]
pub struct RejectedLog {
    path: PathBuf,
    items: Mutex<Vec<WorkItem>>,
    /// Held across the file write so rewrites land in append order.
    writes: AsyncMutex<()>,
}

impl RejectedLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            items: Mutex::new(Vec::new()),
            writes: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items(&self) -> Vec<WorkItem> {
        self.items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// Record `item` and rewrite the file on the blocking pool.
    pub async fn append(&self, item: &WorkItem) -> Result<(), StorageError> {
        let _write = self.writes.lock().await;
        let json = {
            let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
            items.push(item.clone());
            serde_json::to_vec_pretty(&*items)?
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &json)).await?
    }

    /// Like [`append`](Self::append), logging instead of failing.
    pub async fn record(&self, item: &WorkItem) {
        if let Err(e) = self.append(item).await {
            warn!("Failed to update {}: {}", self.path.display(), e);
        }
    }
}
