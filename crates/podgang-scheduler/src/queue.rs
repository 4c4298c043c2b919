//! Group work queue — FIFO of groups needing scheduling attention.
//!
//! Each group id appears at most once. Dequeue blocks until an entry owned
//! by this scheduler instance is available, silently dropping entries that
//! name another scheduler. Closing the queue wakes any blocked dequeue.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use podgang_group::SchedulingGroup;

/// Queue entry: a group id and the scheduler that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedGroup {
    pub group_id: String,
    /// Empty means any scheduler.
    pub scheduler_name: String,
}

impl QueuedGroup {
    pub fn new(group_id: &str, scheduler_name: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            scheduler_name: scheduler_name.to_string(),
        }
    }
}

impl From<&SchedulingGroup> for QueuedGroup {
    fn from(group: &SchedulingGroup) -> Self {
        Self::new(&group.group_id, &group.scheduler_name)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<QueuedGroup>,
    /// Ids currently in `items`.
    queued: HashSet<String>,
    closed: bool,
}

/// FIFO of distinct groups with ownership filtering.
#[derive(Debug)]
pub struct GroupQueue {
    /// Name of the scheduler instance consuming this queue.
    owner: String,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl GroupQueue {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether this scheduler instance handles `entry`.
    pub fn is_responsible(&self, entry: &QueuedGroup) -> bool {
        entry.scheduler_name.is_empty() || entry.scheduler_name == self.owner
    }

    /// Add `entry` unless its group is already queued or the queue is closed.
    pub async fn enqueue(&self, entry: QueuedGroup) -> bool {
        let mut state = self.state.lock().await;
        if state.closed || state.queued.contains(&entry.group_id) {
            return false;
        }
        state.queued.insert(entry.group_id.clone());
        state.items.push_back(entry);
        drop(state);

        self.notify.notify_one();
        true
    }

    /// Pop the next group this scheduler owns, waiting if necessary.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn dequeue(&self) -> Option<QueuedGroup> {
        loop {
            // Register interest before checking state so a close in between
            // is not missed.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                while let Some(entry) = state.items.pop_front() {
                    state.queued.remove(&entry.group_id);
                    if self.is_responsible(&entry) {
                        return Some(entry);
                    }
                    debug!(
                        group = %entry.group_id,
                        owner = %entry.scheduler_name,
                        "skipping group owned by another scheduler"
                    );
                }
            }
            notified.await;
        }
    }

    /// Re-add `entry`, then hold the caller for `cooldown`.
    ///
    /// The sleep happens on the caller's task: a scheduling loop that
    /// requeues pays the cooldown before it dequeues again.
    pub async fn requeue(&self, entry: QueuedGroup, cooldown: Duration) -> bool {
        let added = self.enqueue(entry).await;
        tokio::time::sleep(cooldown).await;
        added
    }

    /// Drop a group from the queue. Returns whether it was queued.
    pub async fn forget(&self, group_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if !state.queued.remove(group_id) {
            return false;
        }
        state.items.retain(|e| e.group_id != group_id);
        true
    }

    /// Close the queue and wake every blocked dequeue.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn contains(&self, group_id: &str) -> bool {
        self.state.lock().await.queued.contains(group_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(id: &str) -> QueuedGroup {
        QueuedGroup::new(id, "")
    }

    #[tokio::test]
    async fn fifo_order() {
        let queue = GroupQueue::new("mine");
        for id in ["a", "b", "c"] {
            assert!(queue.enqueue(entry(id)).await);
        }
        assert_eq!(queue.dequeue().await.unwrap().group_id, "a");
        assert_eq!(queue.dequeue().await.unwrap().group_id, "b");
        assert_eq!(queue.dequeue().await.unwrap().group_id, "c");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_noop() {
        let queue = GroupQueue::new("mine");
        assert!(queue.enqueue(entry("a")).await);
        assert!(!queue.enqueue(entry("a")).await);
        assert_eq!(queue.len().await, 1);

        queue.dequeue().await.unwrap();
        assert!(queue.enqueue(entry("a")).await);
    }

    #[tokio::test]
    async fn foreign_groups_are_dropped() {
        let queue = GroupQueue::new("mine");
        queue.enqueue(QueuedGroup::new("theirs", "other")).await;
        queue.enqueue(QueuedGroup::new("ours", "mine")).await;
        queue.enqueue(QueuedGroup::new("anyone", "")).await;

        assert_eq!(queue.dequeue().await.unwrap().group_id, "ours");
        assert_eq!(queue.dequeue().await.unwrap().group_id, "anyone");
        assert!(!queue.contains("theirs").await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn dequeue_waits_for_enqueue() {
        let queue = Arc::new(GroupQueue::new("mine"));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.enqueue(entry("late")).await;
        let got = consumer.await.unwrap().unwrap();
        assert_eq!(got.group_id, "late");
    }

    #[tokio::test]
    async fn close_unblocks_dequeue() {
        let queue = Arc::new(GroupQueue::new("mine"));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close().await;

        assert!(consumer.await.unwrap().is_none());
        assert!(queue.is_closed().await);
        assert!(!queue.enqueue(entry("after")).await);
    }

    #[tokio::test]
    async fn forget_removes_queued_group() {
        let queue = GroupQueue::new("mine");
        queue.enqueue(entry("a")).await;
        queue.enqueue(entry("b")).await;

        assert!(queue.forget("a").await);
        assert!(!queue.forget("a").await);
        assert_eq!(queue.dequeue().await.unwrap().group_id, "b");
    }

    #[tokio::test]
    async fn requeue_adds_then_cools_down() {
        let queue = GroupQueue::new("mine");
        let started = tokio::time::Instant::now();
        assert!(queue.requeue(entry("a"), Duration::from_millis(30)).await);
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(!queue.requeue(entry("a"), Duration::from_millis(1)).await);
        assert_eq!(queue.len().await, 1);
    }
}
