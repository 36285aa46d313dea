//! Work handle - a gotten item that still owes the queue a `task_done`.

use super::WorkQueue;

/// An item taken from a [`WorkQueue`]. Move semantics: consumed by
/// `complete()`.
///
/// Dropping a handle without completing it (a worker bailing out early or
/// unwinding from a panic) still marks the item done and logs a warning, so
/// `join()` can never wait on an item nobody is processing.
pub struct WorkHandle<'q, T> {
    item: Option<T>,
    queue: &'q WorkQueue<T>,
}

impl<'q, T> WorkHandle<'q, T> {
    pub(crate) fn new(item: T, queue: &'q WorkQueue<T>) -> Self {
        Self {
            item: Some(item),
            queue,
        }
    }

    /// The item being processed.
    pub fn item(&self) -> &T {
        // Only `complete` and `drop` take the item, and both consume the handle.
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Mark the item done.
    pub fn complete(mut self) {
        self.item = None;
        self.queue.finish_one();
    }
}

impl<T> Drop for WorkHandle<'_, T> {
    fn drop(&mut self) {
        if self.item.take().is_some() {
            tracing::warn!("WorkHandle dropped without being completed - marking item done");
            self.queue.finish_one();
        }
    }
}
