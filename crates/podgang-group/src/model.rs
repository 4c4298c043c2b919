//! In-memory model of scheduling groups.
//!
//! A [`SchedulingGroup`] holds one [`ResourceObject`] per role that has been
//! observed so far. Each role keeps the pods still waiting for a node.

use std::collections::HashMap;

use podgang_core::{MiniGroup, PodKey, PodSnapshot};

/// Group scheduling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupState {
    #[default]
    Started,
    /// Every observed role drained.
    Success,
    /// Cancelled from outside the engine.
    Failed,
}

/// Phase plus the pods currently handed to the binder.
#[derive(Debug, Clone, Default)]
pub struct SchedulerGroupState {
    pub state: GroupState,
    /// Pods submitted for binding whose outcome has not reached membership yet.
    pub pods_to_bind: HashMap<PodKey, PodSnapshot>,
}

/// Pending pods of a single role.
#[derive(Debug, Clone)]
pub struct ResourceObject {
    pub role: String,
    pub min: u32,
    pub max: u32,
    pub priority: i32,
    pub pending_pods: HashMap<PodKey, PodSnapshot>,
    /// Always equal to `pending_pods.len()`.
    pub pending_pod_count: usize,
}

impl ResourceObject {
    /// Empty role bucket seeded from a pod's group descriptor.
    pub fn from_mini(mini: &MiniGroup) -> Self {
        Self {
            role: mini.role.clone(),
            min: mini.min_replicas,
            max: mini.max_replicas,
            priority: mini.priority,
            pending_pods: HashMap::new(),
            pending_pod_count: 0,
        }
    }

    /// Insert or refresh a pod. Returns `true` only for a new key.
    pub fn insert(&mut self, pod: &PodSnapshot) -> bool {
        let fresh = self.pending_pods.insert(pod.key(), pod.clone()).is_none();
        if fresh {
            self.pending_pod_count += 1;
        }
        fresh
    }

    /// Refresh an already tracked pod. Unknown keys are left alone.
    pub fn replace(&mut self, pod: &PodSnapshot) -> bool {
        match self.pending_pods.get_mut(&pod.key()) {
            Some(stored) => {
                *stored = pod.clone();
                true
            }
            None => false,
        }
    }

    /// Drop a pod. The counter only moves on a confirmed deletion.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.pending_pods.remove(key).is_some() {
            self.pending_pod_count = self.pending_pod_count.saturating_sub(1);
            true
        } else {
            false
        }
    }

    pub fn is_drained(&self) -> bool {
        self.pending_pod_count == 0
    }

    /// Pods emitted per round; never below one.
    pub fn weight(&self) -> usize {
        self.priority.max(1) as usize
    }
}

/// A named set of pods scheduled together.
#[derive(Debug, Clone)]
pub struct SchedulingGroup {
    pub group_id: String,
    /// Number of distinct roles the group declares.
    pub resource_count: usize,
    /// Role buckets in the order they were first observed.
    pub resources: Vec<ResourceObject>,
    pub status: SchedulerGroupState,
    /// Owning scheduler; empty means any.
    pub scheduler_name: String,
}

impl SchedulingGroup {
    /// New group with no role buckets yet.
    pub fn from_mini(mini: &MiniGroup, scheduler_name: &str) -> Self {
        Self {
            group_id: mini.group.clone(),
            resource_count: mini.role_count.max(1) as usize,
            resources: Vec::new(),
            status: SchedulerGroupState::default(),
            scheduler_name: scheduler_name.to_string(),
        }
    }

    pub fn state(&self) -> GroupState {
        self.status.state
    }

    pub fn resource(&self, role: &str) -> Option<&ResourceObject> {
        self.resources.iter().find(|r| r.role == role)
    }

    pub fn resource_mut(&mut self, role: &str) -> Option<&mut ResourceObject> {
        self.resources.iter_mut().find(|r| r.role == role)
    }

    /// Pending pods across all roles.
    pub fn pending_pod_count(&self) -> usize {
        self.resources.iter().map(|r| r.pending_pod_count).sum()
    }

    /// Find a pending pod in any role.
    pub fn pending_pod(&self, key: &str) -> Option<&PodSnapshot> {
        self.resources.iter().find_map(|r| r.pending_pods.get(key))
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending_pod(key).is_some()
    }

    /// All declared roles have shown up at least once.
    pub fn is_ready(&self) -> bool {
        self.resources.len() >= self.resource_count
    }

    /// Record that `key` was handed to the binder. Only pending pods qualify.
    pub fn mark_in_flight(&mut self, key: &str) -> bool {
        let Some(pod) = self.pending_pod(key).cloned() else {
            return false;
        };
        self.status.pods_to_bind.insert(key.to_string(), pod);
        true
    }

    /// Forget the bind attempt for `key`.
    pub fn settle(&mut self, key: &str) -> bool {
        self.status.pods_to_bind.remove(key).is_some()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.status.pods_to_bind.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.status.pods_to_bind.len()
    }
}
