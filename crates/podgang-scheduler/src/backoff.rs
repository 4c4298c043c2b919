//! Bind retries with per-pod exponential backoff.
//!
//! A failed binding leaves its pod in flight. The retry queue waits out the
//! pod's backoff, then takes a slot on a bounded worker pool to ask the
//! engine to make the pod eligible again and requeue its group.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use podgang_core::PodKey;

use crate::engine::SchedulingGroupEngine;

#[derive(Debug, Clone, Copy)]
struct BackoffEntry {
    backoff: Duration,
    last_update: Instant,
}

/// Per-pod exponential backoff.
#[derive(Debug)]
pub struct PodBackoff {
    initial: Duration,
    max: Duration,
    entries: HashMap<PodKey, BackoffEntry>,
}

impl PodBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            entries: HashMap::new(),
        }
    }

    /// Delay to wait before the next retry of `key`, doubling the stored
    /// value for the retry after that.
    pub fn next_delay(&mut self, key: &str) -> Duration {
        self.gc();
        let now = Instant::now();
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert(BackoffEntry {
                backoff: self.initial,
                last_update: now,
            });

        let delay = entry.backoff;
        entry.backoff = (entry.backoff * 2).min(self.max);
        entry.last_update = now;
        delay
    }

    /// Forget `key`; its next retry starts from the initial delay.
    pub fn reset(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop entries idle for longer than the cap.
    pub fn gc(&mut self) {
        let max = self.max;
        self.entries
            .retain(|_, entry| entry.last_update.elapsed() <= max);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Delayed bind retries, one outstanding retry per pod.
///
/// The backoff runs on its own timer; the worker pool only bounds how many
/// pods are handed back to the engine at once.
pub struct BindRetryQueue {
    engine: Arc<SchedulingGroupEngine>,
    backoff: Mutex<PodBackoff>,
    waiting: Arc<Mutex<HashSet<PodKey>>>,
    workers: Arc<Semaphore>,
}

impl BindRetryQueue {
    pub fn new(engine: Arc<SchedulingGroupEngine>) -> Self {
        let settings = engine.settings();
        let backoff = PodBackoff::new(settings.initial_backoff, settings.max_backoff);
        let workers = Arc::new(Semaphore::new(settings.retry_workers.max(1)));
        Self {
            engine,
            backoff: Mutex::new(backoff),
            waiting: Arc::new(Mutex::new(HashSet::new())),
            workers,
        }
    }

    /// Schedule a retry of `pod_key` after its backoff.
    ///
    /// Returns `false` when a retry for the pod is already waiting.
    pub async fn submit(&self, group_id: &str, pod_key: &str) -> bool {
        {
            let mut waiting = self.waiting.lock().await;
            if !waiting.insert(pod_key.to_string()) {
                warn!(group = %group_id, pod = %pod_key, "retry already pending, abandoning");
                return false;
            }
        }

        let delay = self.backoff.lock().await.next_delay(pod_key);
        debug!(group = %group_id, pod = %pod_key, ?delay, "bind retry scheduled");

        let engine = Arc::clone(&self.engine);
        let waiting = Arc::clone(&self.waiting);
        let workers = Arc::clone(&self.workers);
        let group_id = group_id.to_string();
        let pod_key = pod_key.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Clear the mark before the pod becomes eligible, so a failure on
            // the very next pass can schedule a fresh retry.
            waiting.lock().await.remove(&pod_key);

            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            if engine.retry_pod(&group_id, &pod_key).await {
                debug!(group = %group_id, pod = %pod_key, "pod eligible for binding again");
            }
        });
        true
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self, pod_key: &str) {
        self.waiting.lock().await.insert(pod_key.to_string());
    }

    /// A bind went through; the next failure starts from the initial delay.
    pub async fn reset(&self, pod_key: &str) {
        self.backoff.lock().await.reset(pod_key);
    }

    pub async fn is_waiting(&self, pod_key: &str) -> bool {
        self.waiting.lock().await.contains(pod_key)
    }

    pub async fn waiting(&self) -> usize {
        self.waiting.lock().await.len()
    }
}
