//! Lifecycle monitor — retires groups whose roles have all drained.
//!
//! Runs after every membership removal. Completion is judged against the
//! roles actually observed, not the declared role count: a role that has
//! not shown up yet cannot be empty.

use tracing::info;

use crate::model::{GroupState, SchedulingGroup};
use crate::registry::GroupRegistry;

/// Every observed role has zero pending pods.
pub fn is_complete(group: &SchedulingGroup) -> bool {
    let drained = group.resources.iter().filter(|r| r.is_drained()).count();
    !group.resources.is_empty() && drained == group.resources.len()
}

/// Move a complete group to [`GroupState::Success`] and drop it from the
/// registry. Returns the retired group.
pub fn retire_if_complete(registry: &mut GroupRegistry, group_id: &str) -> Option<SchedulingGroup> {
    if !registry.get(group_id).is_some_and(is_complete) {
        return None;
    }

    let mut group = registry.groups.remove(group_id)?;
    group.status.state = GroupState::Success;
    group.status.pods_to_bind.clear();
    info!(
        group = %group_id,
        roles = group.resources.len(),
        "all pods in group are scheduled, retiring group"
    );
    Some(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceObject;
    use podgang_core::{MiniGroup, PodSnapshot};

    fn group_with_counts(counts: &[usize]) -> SchedulingGroup {
        let pod = PodSnapshot::new("ns", "seed");
        let mini = MiniGroup {
            role_count: counts.len().max(1) as u32,
            ..MiniGroup::singleton(&pod)
        };
        let mut group = SchedulingGroup::from_mini(&mini, "");
        for (i, &count) in counts.iter().enumerate() {
            let mut ro = ResourceObject::from_mini(&MiniGroup {
                role: format!("role-{i}"),
                ..mini.clone()
            });
            for p in 0..count {
                ro.insert(&PodSnapshot::new("ns", &format!("r{i}-p{p}")));
            }
            group.resources.push(ro);
        }
        group
    }

    #[test]
    fn empty_group_is_not_complete() {
        assert!(!is_complete(&group_with_counts(&[])));
    }

    #[test]
    fn complete_only_when_every_role_drained() {
        assert!(is_complete(&group_with_counts(&[0, 0])));
        assert!(!is_complete(&group_with_counts(&[0, 1])));
    }

    #[test]
    fn judged_against_observed_roles() {
        let mut group = group_with_counts(&[0]);
        group.resource_count = 3;
        assert!(is_complete(&group));
    }

    #[test]
    fn retire_leaves_incomplete_group() {
        let mut registry = GroupRegistry::new();
        let group = group_with_counts(&[1]);
        let id = group.group_id.clone();
        registry.groups.insert(id.clone(), group);

        assert!(retire_if_complete(&mut registry, &id).is_none());
        assert!(registry.contains(&id));
        assert!(retire_if_complete(&mut registry, "missing").is_none());
    }

    #[test]
    fn retire_marks_success_and_removes() {
        let mut registry = GroupRegistry::new();
        let group = group_with_counts(&[0, 0]);
        let id = group.group_id.clone();
        registry.groups.insert(id.clone(), group);

        let retired = retire_if_complete(&mut registry, &id).unwrap();
        assert_eq!(retired.state(), GroupState::Success);
        assert!(registry.is_empty());
    }
}
