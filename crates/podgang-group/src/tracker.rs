//! Membership tracking — applies pod notifications to the group model.
//!
//! These are the only operations that change group membership. They work
//! on `&mut GroupRegistry`, so a caller holding the registry lock applies
//! a resolve followed by an add/update/remove as one step.

use tracing::{debug, info, warn};

use podgang_core::{MiniGroup, PodSnapshot};

use crate::error::GroupResult;
use crate::lifecycle;
use crate::model::{ResourceObject, SchedulingGroup};
use crate::registry::GroupRegistry;

/// Outcome of resolving a pod to its group.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub mini: MiniGroup,
    pub group_id: String,
    /// The group did not exist before this call.
    pub created: bool,
}

/// Outcome of removing a pod from its group.
#[derive(Debug, Clone, Default)]
pub struct MemberRemoval {
    /// A pending entry was actually deleted.
    pub removed: bool,
    /// The group drained and was retired by this removal.
    pub retired: Option<SchedulingGroup>,
}

impl GroupRegistry {
    /// Find (or create) the group `pod` belongs to.
    ///
    /// With `create_if_missing` unset, pods of unknown groups resolve to
    /// `None`. Snapshots without a name or namespace are rejected.
    pub fn resolve(&mut self, pod: &PodSnapshot, create_if_missing: bool) -> Option<Resolved> {
        if !pod.is_identifiable() {
            warn!(namespace = %pod.namespace, name = %pod.name, "cannot interpret snapshot as a pod");
            return None;
        }

        let mini = MiniGroup::for_pod(pod);
        let group_id = mini.group.clone();

        if self.groups.contains_key(&group_id) {
            return Some(Resolved {
                mini,
                group_id,
                created: false,
            });
        }

        if !create_if_missing {
            debug!(group = %group_id, pod = %pod.key(), "scheduling group does not exist");
            return None;
        }

        let owner = mini.owner(pod);
        let group = SchedulingGroup::from_mini(&mini, &owner);
        info!(
            group = %group_id,
            roles = group.resource_count,
            scheduler = %owner,
            "scheduling group created"
        );
        self.groups.insert(group_id.clone(), group);

        Some(Resolved {
            mini,
            group_id,
            created: true,
        })
    }

    /// Track `pod` as pending in its role, creating the role bucket on
    /// first sight. Returns `true` when the pod was not tracked before.
    pub fn add_member(&mut self, pod: &PodSnapshot, mini: &MiniGroup) -> GroupResult<bool> {
        let group = self.require_mut(&mini.group)?;

        if let Some(ro) = group.resource_mut(&mini.role) {
            return Ok(ro.insert(pod));
        }

        let mut ro = ResourceObject::from_mini(mini);
        ro.insert(pod);
        group.resources.push(ro);
        debug!(
            group = %mini.group,
            role = %mini.role,
            observed = group.resources.len(),
            declared = group.resource_count,
            "role observed"
        );
        Ok(true)
    }

    /// Refresh the stored snapshot of an already tracked pod.
    pub fn update_member(&mut self, pod: &PodSnapshot, mini: &MiniGroup) -> GroupResult<bool> {
        let group = self.require_mut(&mini.group)?;
        Ok(group
            .resource_mut(&mini.role)
            .is_some_and(|ro| ro.replace(pod)))
    }

    /// Stop tracking `pod`, then retire the group if every role drained.
    pub fn remove_member(&mut self, pod: &PodSnapshot, mini: &MiniGroup) -> GroupResult<MemberRemoval> {
        let key = pod.key();
        let group = self.require_mut(&mini.group)?;

        let mut removed = group
            .resource_mut(&mini.role)
            .is_some_and(|ro| ro.remove(&key));

        // The role may have changed since the pod was added.
        if !removed {
            removed = group.resources.iter_mut().any(|ro| ro.remove(&key));
        }

        if !removed {
            warn!(group = %mini.group, pod = %key, "pod was not pending, counters unchanged");
        }
        group.settle(&key);

        let retired = lifecycle::retire_if_complete(self, &mini.group);
        Ok(MemberRemoval { removed, retired })
    }
}
