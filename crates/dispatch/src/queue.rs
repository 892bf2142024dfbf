use std::{collections::VecDeque, sync::Mutex};

use tokio::sync::Notify;

use crate::{
    error::{DispatchError, Result},
    types::TaskId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueueItem {
    Task(TaskId),
    /// Ends the worker loop once everything ahead of it was served.
    Shutdown,
}

#[derive(Default)]
struct Inner {
    items: VecDeque<QueueItem>,
    pending: usize,
    closed: bool,
}

/// Unbounded FIFO of task ids with a single consumer.
#[derive(Default)]
pub struct DispatchQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a task at the tail.
    ///
    /// `admit` receives the queue depth this task will have (itself
    /// included) and runs under the queue lock, so registration and
    /// enqueueing are one step. Nothing is enqueued if it fails.
    pub fn enqueue_with<F>(&self, admit: F) -> Result<usize>
    where
        F: FnOnce(usize) -> Result<TaskId>,
    {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.closed {
            return Err(DispatchError::ShuttingDown);
        }
        let position = inner.pending + 1;
        let id = admit(position)?;
        inner.items.push_back(QueueItem::Task(id));
        inner.pending = position;
        drop(inner);
        self.notify.notify_one();
        Ok(position)
    }

    /// Wait for the next item. Single consumer.
    pub(crate) async fn next(&self) -> QueueItem {
        loop {
            {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(item) = inner.items.pop_front() {
                    if matches!(item, QueueItem::Task(_)) {
                        inner.pending -= 1;
                    }
                    return item;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Tasks waiting to be served.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .closed
    }

    /// Reject further admissions and queue the shutdown sentinel behind
    /// whatever is pending. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.items.push_back(QueueItem::Shutdown);
        drop(inner);
        self.notify.notify_one();
    }

    /// Remove every task still waiting, in FIFO order.
    pub fn drain_pending(&self) -> Vec<TaskId> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut drained = Vec::with_capacity(inner.pending);
        inner.items.retain(|item| match item {
            QueueItem::Task(id) => {
                drained.push(id.clone());
                false
            },
            QueueItem::Shutdown => true,
        });
        inner.pending = 0;
        drained
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    fn admit(queue: &DispatchQueue, id: &str) -> usize {
        queue.enqueue_with(|_| Ok(TaskId::from(id))).unwrap()
    }

    #[tokio::test]
    async fn fifo_with_positions() {
        let queue = DispatchQueue::new();
        assert_eq!(admit(&queue, "a"), 1);
        assert_eq!(admit(&queue, "b"), 2);
        assert_eq!(admit(&queue, "c"), 3);
        assert_eq!(queue.len(), 3);

        for expected in ["a", "b", "c"] {
            assert_eq!(queue.next().await, QueueItem::Task(TaskId::from(expected)));
        }
        assert!(queue.is_empty());
        assert_eq!(admit(&queue, "d"), 1);
    }

    #[tokio::test]
    async fn failed_admission_enqueues_nothing() {
        let queue = DispatchQueue::new();
        let err = queue
            .enqueue_with(|_| Err(DispatchError::task_not_found("x")))
            .unwrap_err();
        assert!(matches!(err, DispatchError::TaskNotFound { .. }));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn next_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(DispatchQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        admit(&queue, "late");
        let item = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item, QueueItem::Task(TaskId::from("late")));
    }

    #[tokio::test]
    async fn close_puts_sentinel_behind_pending_and_rejects_admissions() {
        let queue = DispatchQueue::new();
        admit(&queue, "a");
        queue.close();
        queue.close();
        assert!(matches!(
            queue.enqueue_with(|_| Ok(TaskId::from("b"))),
            Err(DispatchError::ShuttingDown)
        ));
        assert_eq!(queue.next().await, QueueItem::Task(TaskId::from("a")));
        assert_eq!(queue.next().await, QueueItem::Shutdown);
    }

    #[tokio::test]
    async fn drain_keeps_sentinel() {
        let queue = DispatchQueue::new();
        admit(&queue, "a");
        admit(&queue, "b");
        queue.close();
        let drained = queue.drain_pending();
        assert_eq!(drained, vec![TaskId::from("a"), TaskId::from("b")]);
        assert!(queue.is_empty());
        assert_eq!(queue.next().await, QueueItem::Shutdown);
    }
}
