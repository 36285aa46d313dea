//! Shared result collection written by workers.

use std::sync::{Mutex, MutexGuard};

use crate::models::OutputRecord;

/// Append-only during a batch; drained by the driver between batches.
#[derive(Debug, Default)]
pub struct ResultSet {
    records: Mutex<Vec<OutputRecord>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<OutputRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a record, returning the new length.
    pub fn push(&self, record: OutputRecord) -> usize {
        let mut records = self.records();
        records.push(record);
        records.len()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents, in arrival order.
    pub fn snapshot(&self) -> Vec<OutputRecord> {
        self.records().clone()
    }

    /// Remove and return everything.
    pub fn take(&self) -> Vec<OutputRecord> {
        std::mem::take(&mut *self.records())
    }
}
