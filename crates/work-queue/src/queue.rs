//! FIFO queue with event-based wake-up.

use crate::{QueueError, QueueResult};
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error};

struct Inner<T> {
    pending: VecDeque<T>,
    /// The consumer parked on an empty queue.
    waiter: Option<oneshot::Sender<T>>,
}

/// Queue with a single reader.
///
/// `push` never blocks. `consume` returns the oldest item, parking until one
/// arrives when the queue is empty. Only one consume may be parked at a time.
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                waiter: None,
            }),
        }
    }
}

impl<T: Send> WorkQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, handing it straight to a parked consumer if there is one.
    pub async fn push(&self, item: T) {
        let mut inner = self.inner.lock().await;
        let item = match inner.waiter.take() {
            Some(waiter) => match waiter.send(item) {
                Ok(()) => {
                    debug!("Handed item to waiting consumer");
                    return;
                }
                // Consumer went away; keep the item.
                Err(item) => item,
            },
            None => item,
        };
        inner.pending.push_back(item);
        debug!(pending = inner.pending.len(), "Queued item");
    }

    /// Take the oldest item, waiting for one if the queue is empty.
    pub async fn consume(&self) -> QueueResult<T> {
        let receiver = {
            let mut inner = self.inner.lock().await;
            if let Some(item) = inner.pending.pop_front() {
                return Ok(item);
            }
            if inner.waiter.as_ref().is_some_and(|waiter| !waiter.is_closed()) {
                return Err(QueueError::ConsumeOutstanding);
            }
            let (sender, receiver) = oneshot::channel();
            inner.waiter = Some(sender);
            receiver
        };

        receiver.await.map_err(|_| QueueError::Closed)
    }

    /// Feed every item to `callback`, one at a time, forever.
    ///
    /// Callback failures are logged and the loop moves on to the next item.
    /// Returns only if consuming fails.
    pub async fn delegate<F, Fut, E>(&self, mut callback: F) -> QueueResult<()>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        loop {
            let item = self.consume().await?;
            if let Err(err) = callback(item).await {
                error!(error = %err, "Queued work failed");
            }
        }
    }

    /// Number of items waiting.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn pending_items_come_out_in_order() {
        let queue = WorkQueue::new();
        queue.push(1).await;
        queue.push(2).await;
        queue.push(3).await;

        assert_eq!(queue.len().await, 3);
        assert_eq!(queue.consume().await, Ok(1));
        assert_eq!(queue.consume().await, Ok(2));
        assert_eq!(queue.consume().await, Ok(3));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn consume_waits_for_push() {
        let queue = Arc::new(WorkQueue::new());
        let consumer = tokio::spawn({
            let queue = queue.clone();
            async move { queue.consume().await }
        });

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push("bundle").await;

        assert_eq!(consumer.await.unwrap(), Ok("bundle"));
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn second_consume_is_rejected() {
        let queue = Arc::new(WorkQueue::<u32>::new());
        let first = tokio::spawn({
            let queue = queue.clone();
            async move { queue.consume().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(queue.consume().await, Err(QueueError::ConsumeOutstanding));

        queue.push(7).await;
        assert_eq!(first.await.unwrap(), Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_consume_does_not_lose_items() {
        let queue = Arc::new(WorkQueue::<u32>::new());
        let abandoned = tokio::spawn({
            let queue = queue.clone();
            async move { queue.consume().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        abandoned.abort();
        let _ = abandoned.await;

        queue.push(5).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.consume().await, Ok(5));
    }

    #[tokio::test(start_paused = true)]
    async fn delegate_survives_callback_failures() {
        let queue = Arc::new(WorkQueue::new());
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .delegate(|item: u32| {
                        let seen_tx = seen_tx.clone();
                        async move {
                            let _ = seen_tx.send(item);
                            if item % 2 == 0 {
                                Err(format!("item {item} rejected"))
                            } else {
                                Ok(())
                            }
                        }
                    })
                    .await
            }
        });

        for item in 1..=4 {
            queue.push(item).await;
        }

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(seen_rx.recv().await.unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert!(!worker.is_finished());
        worker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn delegate_runs_one_item_at_a_time() {
        let queue = Arc::new(WorkQueue::new());
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .delegate(|item: u32| {
                        let done_tx = done_tx.clone();
                        async move {
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            let _ = done_tx.send((item, tokio::time::Instant::now()));
                            Ok::<(), String>(())
                        }
                    })
                    .await
            }
        });

        queue.push(1).await;
        queue.push(2).await;

        let (first, first_at) = done_rx.recv().await.unwrap();
        let (second, second_at) = done_rx.recv().await.unwrap();
        assert_eq!((first, second), (1, 2));
        assert!(second_at - first_at >= Duration::from_secs(1));
        worker.abort();
    }
}
