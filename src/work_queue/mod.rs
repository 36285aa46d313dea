//! Bounded FIFO work queue with completion tracking.
//!
//! Mirrors the classic producer/consumer queue: `put` enqueues, `get`
//! suspends until an item is available, every gotten item must be marked
//! done, and `join` suspends until every put item has been marked done.
//! Completion is tracked through [`WorkHandle`] so an item can never be
//! left unacknowledged.

mod error;
mod handle;

pub use error::WorkQueueError;
pub use handle::WorkHandle;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::{watch, Semaphore};

/// Default number of items the queue holds before `put` suspends.
pub const DEFAULT_CAPACITY: usize = 1024;

pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// One permit per queued item.
    available: Semaphore,
    /// One permit per free slot.
    slots: Semaphore,
    /// Items put but not yet marked done.
    unfinished: watch::Sender<usize>,
    completed: AtomicUsize,
    capacity: usize,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (unfinished, _) = watch::channel(0);
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
            slots: Semaphore::new(capacity),
            unfinished,
            completed: AtomicUsize::new(0),
            capacity,
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue an item, suspending while the queue is full.
    pub async fn put(&self, item: T) -> Result<(), WorkQueueError> {
        let slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| WorkQueueError::Closed)?;
        slot.forget();

        // Count the item before it becomes visible so join() never sees a
        // transient zero.
        self.unfinished.send_modify(|n| *n += 1);
        self.items().push_back(item);
        self.available.add_permits(1);
        Ok(())
    }

    /// Take the next item, suspending until one is available.
    ///
    /// Returns `None` once the queue has been closed.
    pub async fn get(&self) -> Option<WorkHandle<'_, T>> {
        let permit = self.available.acquire().await.ok()?;
        permit.forget();

        let item = self.items().pop_front()?;
        self.slots.add_permits(1);
        Some(WorkHandle::new(item, self))
    }

    /// Mark one previously gotten item as done.
    ///
    /// [`WorkHandle::complete`] calls this; only call it directly when
    /// managing completion by hand.
    pub fn task_done(&self) -> Result<(), WorkQueueError> {
        let mut result = Ok(());
        self.unfinished.send_modify(|n| {
            if *n == 0 {
                result = Err(WorkQueueError::TooManyTaskDone);
            } else {
                *n -= 1;
            }
        });
        if result.is_ok() {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub(crate) fn finish_one(&self) {
        if let Err(e) = self.task_done() {
            tracing::error!("Work queue accounting error: {}", e);
        }
    }

    /// Suspend until every put item has been marked done.
    pub async fn join(&self) {
        let mut rx = self.unfinished.subscribe();
        // The sender lives in `self`, so this can't observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stop the queue: pending and future `get` calls return `None`,
    /// `put` returns [`WorkQueueError::Closed`].
    pub fn close(&self) {
        self.available.close();
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.available.is_closed()
    }

    /// Items waiting to be picked up.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items put but not yet marked done (queued plus in flight).
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }

    /// Total `task_done` calls so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = WorkQueue::new(8);
        for i in 0..3 {
            queue.put(i).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            let handle = queue.get().await.unwrap();
            seen.push(*handle.item());
            handle.complete();
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(queue.completed(), 3);
    }

    #[tokio::test]
    async fn test_join_returns_immediately_when_empty() {
        let queue: WorkQueue<u32> = WorkQueue::new(4);
        timeout(Duration::from_secs(1), queue.join())
            .await
            .expect("join on empty queue should not block");
    }

    #[tokio::test]
    async fn test_join_waits_for_every_item() {
        let queue = Arc::new(WorkQueue::new(16));
        let n = 50;

        let mut workers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            workers.push(tokio::spawn(async move {
                while let Some(handle) = queue.get().await {
                    tokio::task::yield_now().await;
                    handle.complete();
                }
            }));
        }

        for i in 0..n {
            queue.put(i).await.unwrap();
        }
        timeout(Duration::from_secs(5), queue.join())
            .await
            .expect("join should return once all items are done");

        assert_eq!(queue.completed(), n);
        assert_eq!(queue.unfinished(), 0);

        queue.close();
        for worker in workers {
            worker.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_join_blocks_while_item_in_flight() {
        let queue = WorkQueue::new(4);
        queue.put("a").await.unwrap();
        let handle = queue.get().await.unwrap();

        assert!(timeout(Duration::from_millis(50), queue.join()).await.is_err());

        handle.complete();
        timeout(Duration::from_secs(1), queue.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handle_is_marked_done() {
        let queue = WorkQueue::new(4);
        queue.put(1).await.unwrap();
        {
            let _handle = queue.get().await.unwrap();
        }
        assert_eq!(queue.unfinished(), 0);
        assert_eq!(queue.completed(), 1);
    }

    #[tokio::test]
    async fn test_get_suspends_until_put() {
        let queue = Arc::new(WorkQueue::new(4));
        assert!(timeout(Duration::from_millis(50), queue.get()).await.is_err());

        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.put(7).await.unwrap();
        });

        let handle = timeout(Duration::from_secs(1), queue.get())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*handle.item(), 7);
        handle.complete();
    }

    #[tokio::test]
    async fn test_put_suspends_when_full() {
        let queue = WorkQueue::new(1);
        queue.put(1).await.unwrap();
        assert!(timeout(Duration::from_millis(50), queue.put(2)).await.is_err());

        let handle = queue.get().await.unwrap();
        timeout(Duration::from_secs(1), queue.put(3))
            .await
            .unwrap()
            .unwrap();
        handle.complete();
    }

    #[tokio::test]
    async fn test_too_many_task_done() {
        let queue: WorkQueue<u8> = WorkQueue::new(1);
        assert_eq!(queue.task_done(), Err(WorkQueueError::TooManyTaskDone));
    }

    #[tokio::test]
    async fn test_close_wakes_getters() {
        let queue: Arc<WorkQueue<u8>> = Arc::new(WorkQueue::new(1));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await.is_none() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();

        assert!(waiter.await.unwrap());
        assert_eq!(queue.put(1).await, Err(WorkQueueError::Closed));
    }
}
