//! Scheduling group engine — owns the group model and the work queue.
//!
//! The engine is shared (`Arc`) between the task feeding watch events and
//! the scheduling loop. All membership changes run under one engine-wide
//! lock; group cardinality is small next to pod cardinality, so contention
//! stays low.
//!
//! Lock order: registry, then queue. The queue lock is never held while
//! waiting for the registry.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use podgang_core::{
    ClusterEvent, EngineSettings, NodeSnapshot, PodKey, PodSnapshot, WatchEvent,
    is_unassigned_non_terminated,
};
use podgang_group::{GroupError, GroupRegistry, GroupResult, GroupState, SchedulingGroup};

use crate::nodes::NodeSet;
use crate::orderer;
use crate::queue::{GroupQueue, QueuedGroup};

/// The gang-scheduling coordination engine.
pub struct SchedulingGroupEngine {
    settings: EngineSettings,
    registry: Mutex<GroupRegistry>,
    queue: GroupQueue,
    nodes: Arc<NodeSet>,
}

impl SchedulingGroupEngine {
    pub fn new(settings: EngineSettings) -> Self {
        let queue = GroupQueue::new(&settings.scheduler_name);
        Self {
            settings,
            registry: Mutex::new(GroupRegistry::new()),
            queue,
            nodes: Arc::new(NodeSet::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn scheduler_name(&self) -> &str {
        &self.settings.scheduler_name
    }

    /// Nodes seen through node events.
    pub fn nodes(&self) -> Arc<NodeSet> {
        Arc::clone(&self.nodes)
    }

    // ── Notifications ───────────────────────────────────────────────

    /// Dispatch a watch notification to the handler for its entity kind.
    pub async fn handle_event(&self, event: ClusterEvent) {
        match event {
            ClusterEvent::Pod(event) => self.handle_pod_event(event).await,
            ClusterEvent::Node(event) => self.handle_node_event(event).await,
        }
    }

    /// Route a pod notification through the unassigned-pod filter.
    ///
    /// An update that moves a pod out of the pending stream (bound or
    /// finished) is a removal; one that moves it in is an add.
    pub async fn handle_pod_event(&self, event: WatchEvent<PodSnapshot>) {
        match event {
            WatchEvent::Added { object } => {
                if is_unassigned_non_terminated(&object) {
                    self.on_pod_added(&object).await;
                }
            }
            WatchEvent::Updated { old, new } => {
                match (
                    is_unassigned_non_terminated(&old),
                    is_unassigned_non_terminated(&new),
                ) {
                    (true, true) => self.on_pod_updated(&new).await,
                    (true, false) => self.on_pod_deleted(&old).await,
                    (false, true) => self.on_pod_added(&new).await,
                    (false, false) => {}
                }
            }
            WatchEvent::Deleted { object } => {
                if is_unassigned_non_terminated(&object) {
                    self.on_pod_deleted(&object).await;
                }
            }
        }
    }

    pub async fn handle_node_event(&self, event: WatchEvent<NodeSnapshot>) {
        self.nodes.apply(event).await;
    }

    async fn on_pod_added(&self, pod: &PodSnapshot) {
        let mut registry = self.registry.lock().await;
        let Some(resolved) = registry.resolve(pod, true) else {
            warn!(pod = %pod.key(), "add: failed to get scheduling group");
            return;
        };

        let fresh = match registry.add_member(pod, &resolved.mini) {
            Ok(fresh) => fresh,
            Err(e) => {
                error!(pod = %pod.key(), error = %e, "add: failed to track pod");
                return;
            }
        };
        debug!(group = %resolved.group_id, pod = %pod.key(), fresh, "pod pending");

        if resolved.created || fresh {
            if let Some(group) = registry.get(&resolved.group_id) {
                if self.queue.enqueue(QueuedGroup::from(group)).await {
                    debug!(group = %resolved.group_id, "group queued for scheduling");
                }
            }
        }
    }

    async fn on_pod_updated(&self, pod: &PodSnapshot) {
        let mut registry = self.registry.lock().await;
        let Some(resolved) = registry.resolve(pod, false) else {
            info!(pod = %pod.key(), "update: scheduling group does not exist");
            return;
        };
        if let Err(e) = registry.update_member(pod, &resolved.mini) {
            error!(pod = %pod.key(), error = %e, "update: failed to refresh pod");
        }
    }

    async fn on_pod_deleted(&self, pod: &PodSnapshot) {
        let mut registry = self.registry.lock().await;
        let Some(resolved) = registry.resolve(pod, false) else {
            info!(pod = %pod.key(), "delete: scheduling group does not exist");
            return;
        };

        match registry.remove_member(pod, &resolved.mini) {
            Ok(removal) => {
                if removal.retired.is_some() {
                    self.queue.forget(&resolved.group_id).await;
                }
            }
            Err(e) => error!(pod = %pod.key(), error = %e, "delete: failed to remove pod"),
        }
    }

    // ── Scheduling loop surface ─────────────────────────────────────

    /// Next group this scheduler owns, blocking until one is queued.
    ///
    /// Returns a snapshot of the group. Groups retired or forgotten while
    /// queued are skipped. `None` once the engine shuts down.
    pub async fn next_scheduling_group(&self) -> Option<SchedulingGroup> {
        loop {
            let entry = self.queue.dequeue().await?;
            let registry = self.registry.lock().await;
            match registry.get(&entry.group_id) {
                Some(group) if group.state() == GroupState::Started => {
                    debug!(group = %entry.group_id, "about to schedule group");
                    return Some(group.clone());
                }
                _ => debug!(group = %entry.group_id, "skipping retired group"),
            }
        }
    }

    /// Requeue a group that could not make progress, then cool down.
    pub async fn push_back_scheduling_group(&self, group_id: &str) {
        let entry = {
            let registry = self.registry.lock().await;
            match registry.get(group_id) {
                Some(group) => QueuedGroup::from(group),
                None => {
                    debug!(group = %group_id, "push back: group no longer tracked");
                    return;
                }
            }
        };
        debug!(group = %group_id, delay = ?self.settings.requeue_delay, "pushing back group");
        self.queue.requeue(entry, self.settings.requeue_delay).await;
    }

    /// Drop a group from the model and the queue.
    pub async fn forget_scheduling_group(&self, group_id: &str) -> Option<SchedulingGroup> {
        let mut registry = self.registry.lock().await;
        self.queue.forget(group_id).await;
        registry.forget(group_id)
    }

    /// External cancellation: the group ends in `Failed`.
    pub async fn cancel_scheduling_group(&self, group_id: &str) -> GroupResult<SchedulingGroup> {
        let mut registry = self.registry.lock().await;
        self.queue.forget(group_id).await;
        registry.cancel(group_id)
    }

    /// Current dispatch order for a group.
    pub async fn order(&self, group_id: &str) -> GroupResult<Vec<PodKey>> {
        let registry = self.registry.lock().await;
        let group = registry
            .get(group_id)
            .ok_or_else(|| GroupError::GroupNotFound(group_id.to_string()))?;
        Ok(orderer::order(group).collect())
    }

    /// Mark a pending pod as handed to the binder and return its snapshot.
    pub async fn mark_in_flight(&self, group_id: &str, pod_key: &str) -> GroupResult<PodSnapshot> {
        let mut registry = self.registry.lock().await;
        registry.mark_in_flight(group_id, pod_key)?;
        registry
            .get(group_id)
            .and_then(|g| g.pending_pod(pod_key))
            .cloned()
            .ok_or_else(|| GroupError::PodNotPending {
                group: group_id.to_string(),
                pod: pod_key.to_string(),
            })
    }

    /// Clear a pod's in-flight mark.
    pub async fn settle(&self, group_id: &str, pod_key: &str) -> GroupResult<bool> {
        self.registry.lock().await.settle(group_id, pod_key)
    }

    /// Make a pod whose bind failed eligible again and requeue its group.
    ///
    /// Returns `false` when the group or the pending pod is gone.
    pub async fn retry_pod(&self, group_id: &str, pod_key: &str) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(group) = registry.get_mut(group_id) else {
            debug!(group = %group_id, pod = %pod_key, "retry: group no longer tracked");
            return false;
        };
        group.settle(pod_key);
        if !group.is_pending(pod_key) {
            warn!(group = %group_id, pod = %pod_key, "retry: pod no longer pending");
            return false;
        }
        let entry = QueuedGroup::from(&*group);
        drop(registry);

        self.queue.enqueue(entry).await;
        true
    }

    /// Snapshot of a pod handed to the binder, for binders that only see
    /// the binding.
    pub async fn in_flight_pod(&self, pod_key: &str) -> Option<PodSnapshot> {
        self.registry.lock().await.find_in_flight(pod_key).cloned()
    }

    pub async fn snapshot(&self, group_id: &str) -> Option<SchedulingGroup> {
        self.registry.lock().await.get(group_id).cloned()
    }

    pub async fn group_ids(&self) -> Vec<String> {
        self.registry.lock().await.group_ids()
    }

    pub async fn group_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub async fn is_queued(&self, group_id: &str) -> bool {
        self.queue.contains(group_id).await
    }

    /// Close the queue; blocked `next_scheduling_group` calls return `None`.
    pub async fn shutdown(&self) {
        self.queue.close().await;
        info!("scheduling group engine shut down");
    }
}
