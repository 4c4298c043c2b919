//! Group registry — the engine-owned map of live scheduling groups.
//!
//! Membership operations live in [`crate::tracker`] and retirement in
//! [`crate::lifecycle`]; this module holds storage and the lookups both
//! build on. The registry is plain data: callers provide the locking.

use std::collections::HashMap;

use tracing::info;

use podgang_core::PodSnapshot;

use crate::error::{GroupError, GroupResult};
use crate::model::{GroupState, SchedulingGroup};

/// Live scheduling groups keyed by group id.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    pub(crate) groups: HashMap<String, SchedulingGroup>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, group_id: &str) -> Option<&SchedulingGroup> {
        self.groups.get(group_id)
    }

    pub fn get_mut(&mut self, group_id: &str) -> Option<&mut SchedulingGroup> {
        self.groups.get_mut(group_id)
    }

    pub(crate) fn require_mut(&mut self, group_id: &str) -> GroupResult<&mut SchedulingGroup> {
        self.groups
            .get_mut(group_id)
            .ok_or_else(|| GroupError::GroupNotFound(group_id.to_string()))
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.groups.contains_key(group_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group ids in sorted order.
    pub fn group_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.groups.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop a group without touching its state.
    pub fn forget(&mut self, group_id: &str) -> Option<SchedulingGroup> {
        let removed = self.groups.remove(group_id);
        if removed.is_some() {
            info!(group = %group_id, "forgot scheduling group");
        }
        removed
    }

    /// External cancellation: the only way into [`GroupState::Failed`].
    pub fn cancel(&mut self, group_id: &str) -> GroupResult<SchedulingGroup> {
        let mut group = self
            .groups
            .remove(group_id)
            .ok_or_else(|| GroupError::GroupNotFound(group_id.to_string()))?;
        group.status.state = GroupState::Failed;
        info!(group = %group_id, pending = group.pending_pod_count(), "scheduling group cancelled");
        Ok(group)
    }

    /// Mark a pending pod as handed to the binder.
    pub fn mark_in_flight(&mut self, group_id: &str, pod_key: &str) -> GroupResult<()> {
        let group = self.require_mut(group_id)?;
        if group.mark_in_flight(pod_key) {
            Ok(())
        } else {
            Err(GroupError::PodNotPending {
                group: group_id.to_string(),
                pod: pod_key.to_string(),
            })
        }
    }

    /// Clear the in-flight mark for a pod. Returns whether one was set.
    pub fn settle(&mut self, group_id: &str, pod_key: &str) -> GroupResult<bool> {
        Ok(self.require_mut(group_id)?.settle(pod_key))
    }

    /// Snapshot of an in-flight pod, whichever group holds it.
    pub fn find_in_flight(&self, pod_key: &str) -> Option<&PodSnapshot> {
        self.groups
            .values()
            .find_map(|g| g.status.pods_to_bind.get(pod_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgang_core::{MiniGroup, PodSnapshot};

    fn registry_with(pod: &PodSnapshot) -> GroupRegistry {
        let mut registry = GroupRegistry::new();
        let resolved = registry.resolve(pod, true).unwrap();
        registry.add_member(pod, &resolved.mini).unwrap();
        registry
    }

    #[test]
    fn registry_starts_empty() {
        let registry = GroupRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("ns/a").is_none());
        assert!(registry.group_ids().is_empty());
    }

    #[test]
    fn forget_removes_group() {
        let pod = PodSnapshot::new("ns", "a");
        let mut registry = registry_with(&pod);
        assert!(registry.contains("ns/a"));
        assert!(registry.forget("ns/a").is_some());
        assert!(registry.forget("ns/a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_moves_group_to_failed() {
        let pod = PodSnapshot::new("ns", "a");
        let mut registry = registry_with(&pod);
        let cancelled = registry.cancel("ns/a").unwrap();
        assert_eq!(cancelled.state(), GroupState::Failed);
        assert!(!registry.contains("ns/a"));
        assert_eq!(
            registry.cancel("ns/a").unwrap_err(),
            GroupError::GroupNotFound("ns/a".to_string())
        );
    }

    #[test]
    fn in_flight_marks_round_trip_through_registry() {
        let pod = PodSnapshot::new("ns", "a");
        let mut registry = registry_with(&pod);

        registry.mark_in_flight("ns/a", "ns/a").unwrap();
        assert!(registry.get("ns/a").unwrap().is_in_flight("ns/a"));
        assert!(registry.settle("ns/a", "ns/a").unwrap());
        assert!(!registry.settle("ns/a", "ns/a").unwrap());

        assert!(matches!(
            registry.mark_in_flight("ns/a", "ns/b"),
            Err(GroupError::PodNotPending { .. })
        ));
        assert!(matches!(
            registry.settle("missing", "ns/a"),
            Err(GroupError::GroupNotFound(_))
        ));
    }

    #[test]
    fn find_in_flight_searches_all_groups() {
        let a = PodSnapshot::new("ns", "a");
        let b = PodSnapshot::new("ns", "b");
        let mut registry = registry_with(&a);
        let resolved = registry.resolve(&b, true).unwrap();
        registry.add_member(&b, &resolved.mini).unwrap();

        assert!(registry.find_in_flight("ns/b").is_none());
        registry.mark_in_flight("ns/b", "ns/b").unwrap();
        assert_eq!(registry.find_in_flight("ns/b").unwrap().name, "b");
    }

    #[test]
    fn group_ids_are_sorted() {
        let mut registry = GroupRegistry::new();
        for name in ["c", "a", "b"] {
            let pod = PodSnapshot::new("ns", name);
            let mini = MiniGroup::for_pod(&pod);
            registry.resolve(&pod, true).unwrap();
            registry.add_member(&pod, &mini).unwrap();
        }
        assert_eq!(registry.group_ids(), vec!["ns/a", "ns/b", "ns/c"]);
    }
}
