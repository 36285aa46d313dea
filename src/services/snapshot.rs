//! Periodic and end-of-batch persistence of reconciled results.

use tokio::sync::Mutex;
use tracing::info;

use super::reconcile::{dedup, reconcile};
use super::results::ResultSet;
use crate::models::{OutputRecord, WorkItem};
use crate::storage::{SnapshotWriter, StorageError};

#[derive(Debug, Default)]
struct SnapshotState {
    /// Reconciled output of finished batches.
    accumulated: Vec<OutputRecord>,
    /// Seed order of the batch in flight.
    batch: Vec<WorkItem>,
}

/// Writes `accumulated + reconcile(batch, results)` as one snapshot.
///
/// Writes are serialized; a worker-triggered snapshot and the driver's
/// end-of-batch snapshot never interleave.
pub struct Snapshotter {
    writer: SnapshotWriter,
    state: Mutex<SnapshotState>,
}

impl Snapshotter {
    pub fn new(writer: SnapshotWriter) -> Self {
        Self {
            writer,
            state: Mutex::new(SnapshotState::default()),
        }
    }

    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    /// Set the seed order used to reconcile the next batch.
    pub async fn begin_batch(&self, seed: Vec<WorkItem>) {
        self.state.lock().await.batch = seed;
    }

    /// Everything persisted so far plus the in-flight batch.
    pub async fn current(&self, results: &ResultSet) -> Vec<OutputRecord> {
        let state = self.state.lock().await;
        Self::combine(&state, &results.snapshot())
    }

    fn combine(state: &SnapshotState, in_flight: &[OutputRecord]) -> Vec<OutputRecord> {
        let mut output = state.accumulated.clone();
        output.extend(reconcile(&state.batch, in_flight));
        dedup(output)
    }

    /// Write a snapshot including the in-flight batch. Returns the number
    /// of rows written.
    pub async fn persist(&self, results: &ResultSet) -> Result<usize, StorageError> {
        let state = self.state.lock().await;
        let output = Self::combine(&state, &results.snapshot());
        // The guard stays held so writes never interleave.
        let rows = self.write(output).await?;
        drop(state);
        Ok(rows)
    }

    /// Fold the drained batch into the accumulated output and write it.
    pub async fn finish_batch(&self, results: &ResultSet) -> Result<usize, StorageError> {
        let mut state = self.state.lock().await;
        let batch_results = results.take();
        let matched = reconcile(&state.batch, &batch_results);
        state.accumulated.extend(matched);
        state.batch.clear();

        let output = dedup(state.accumulated.clone());
        let rows = self.write(output).await?;
        drop(state);
        Ok(rows)
    }

    /// Render and write on the blocking pool.
    async fn write(&self, output: Vec<OutputRecord>) -> Result<usize, StorageError> {
        let rows = output.len();
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || writer.write(&output)).await??;
        info!("{} records saved to {}", rows, self.writer.file_name());
        Ok(rows)
    }
}
