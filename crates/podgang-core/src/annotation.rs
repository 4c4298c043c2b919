//! Scheduling-group annotation parsing.
//!
//! A pod joins a group by carrying a JSON object under the
//! [`GROUP_ANNOTATION`] key:
//!
//! ```json
//! {"Group": "train-7", "Role": "worker", "MinReplicas": 2, "MaxReplicas": 4,
//!  "Priority": 3, "RoleCount": 2}
//! ```
//!
//! Pods without the annotation, or with one that cannot be used, form a
//! singleton group of their own. A bad annotation is never an error to the
//! caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::PodSnapshot;

/// Well-known annotation key carrying the group descriptor.
pub const GROUP_ANNOTATION: &str = "ecp-scheduling-group";

/// Role assigned to pods that do not name one.
pub const DEFAULT_ROLE: &str = "default-role";

/// Why an annotation was rejected.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("invalid group annotation JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("group annotation has an empty group name")]
    MissingGroup,

    #[error("min replicas {min} exceeds max replicas {max}")]
    ReplicaBounds { min: u32, max: u32 },
}

/// Group membership derived from a single pod's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MiniGroup {
    #[serde(alias = "group", alias = "GroupID", alias = "groupId")]
    pub group: String,
    #[serde(default, alias = "role")]
    pub role: String,
    #[serde(default, alias = "minReplicas")]
    pub min_replicas: u32,
    #[serde(default, alias = "maxReplicas")]
    pub max_replicas: u32,
    #[serde(default = "default_priority", alias = "priority")]
    pub priority: i32,
    #[serde(default = "default_role_count", alias = "roleCount")]
    pub role_count: u32,
    /// Scheduler instance that owns this group.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "schedulerName")]
    pub scheduler_name: Option<String>,
}

fn default_priority() -> i32 {
    1
}

fn default_role_count() -> u32 {
    1
}

impl MiniGroup {
    /// The singleton group a pod falls into when it declares none.
    pub fn singleton(pod: &PodSnapshot) -> Self {
        Self {
            group: pod.key(),
            role: DEFAULT_ROLE.to_string(),
            min_replicas: 1,
            max_replicas: 1,
            priority: 1,
            role_count: 1,
            scheduler_name: None,
        }
    }

    /// Parse and normalize an annotation value.
    pub fn parse(raw: &str) -> Result<Self, AnnotationError> {
        let mut mini: MiniGroup = serde_json::from_str(raw)?;

        if mini.group.trim().is_empty() {
            return Err(AnnotationError::MissingGroup);
        }
        if mini.min_replicas > mini.max_replicas {
            return Err(AnnotationError::ReplicaBounds {
                min: mini.min_replicas,
                max: mini.max_replicas,
            });
        }

        if mini.role.is_empty() {
            mini.role = DEFAULT_ROLE.to_string();
        }
        mini.priority = mini.priority.max(1);
        mini.role_count = mini.role_count.max(1);
        Ok(mini)
    }

    /// Derive the group for `pod`, falling back to its singleton group.
    pub fn for_pod(pod: &PodSnapshot) -> Self {
        let Some(raw) = pod.annotations.get(GROUP_ANNOTATION) else {
            return Self::singleton(pod);
        };

        match Self::parse(raw) {
            Ok(mini) => mini,
            Err(e) => {
                warn!(pod = %pod.key(), error = %e, "malformed group annotation, using singleton group");
                Self::singleton(pod)
            }
        }
    }

    /// Scheduler that owns the group: the annotation wins over the pod spec.
    pub fn owner(&self, pod: &PodSnapshot) -> String {
        self.scheduler_name
            .clone()
            .unwrap_or_else(|| pod.scheduler_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotated(value: &str) -> PodSnapshot {
        PodSnapshot::new("ns", "a").with_annotation(GROUP_ANNOTATION, value)
    }

    #[test]
    fn missing_annotation_yields_singleton() {
        let pod = PodSnapshot::new("ns", "a");
        let mini = MiniGroup::for_pod(&pod);
        assert_eq!(mini.group, "ns/a");
        assert_eq!(mini.role, DEFAULT_ROLE);
        assert_eq!((mini.min_replicas, mini.max_replicas), (1, 1));
        assert_eq!(mini.priority, 1);
        assert_eq!(mini.role_count, 1);
    }

    #[test]
    fn full_annotation_is_parsed() {
        let pod = annotated(
            r#"{"Group":"train","Role":"worker","MinReplicas":2,"MaxReplicas":4,"Priority":3,"RoleCount":2}"#,
        );
        let mini = MiniGroup::for_pod(&pod);
        assert_eq!(mini.group, "train");
        assert_eq!(mini.role, "worker");
        assert_eq!(mini.min_replicas, 2);
        assert_eq!(mini.max_replicas, 4);
        assert_eq!(mini.priority, 3);
        assert_eq!(mini.role_count, 2);
        assert_eq!(mini.scheduler_name, None);
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        let mini = MiniGroup::parse(
            r#"{"group":"g","role":"ps","minReplicas":1,"maxReplicas":1,"priority":2,"roleCount":3,"schedulerName":"mine"}"#,
        )
        .unwrap();
        assert_eq!(mini.group, "g");
        assert_eq!(mini.role, "ps");
        assert_eq!(mini.priority, 2);
        assert_eq!(mini.role_count, 3);
        assert_eq!(mini.scheduler_name.as_deref(), Some("mine"));
    }

    #[test]
    fn garbage_annotation_falls_back_to_singleton() {
        let mini = MiniGroup::for_pod(&annotated("{not json"));
        assert_eq!(mini, MiniGroup::singleton(&PodSnapshot::new("ns", "a")));
    }

    #[test]
    fn empty_group_is_rejected() {
        assert!(matches!(
            MiniGroup::parse(r#"{"Group":"  ","Role":"r"}"#),
            Err(AnnotationError::MissingGroup)
        ));
    }

    #[test]
    fn inverted_replica_bounds_are_rejected() {
        let err = MiniGroup::parse(r#"{"Group":"g","MinReplicas":3,"MaxReplicas":1}"#).unwrap_err();
        assert!(matches!(err, AnnotationError::ReplicaBounds { min: 3, max: 1 }));
        assert_eq!(MiniGroup::for_pod(&annotated(r#"{"Group":"g","MinReplicas":3,"MaxReplicas":1}"#)).group, "ns/a");
    }

    #[test]
    fn normalizes_role_priority_and_role_count() {
        let mini = MiniGroup::parse(r#"{"Group":"g","Priority":-4,"RoleCount":0}"#).unwrap();
        assert_eq!(mini.role, DEFAULT_ROLE);
        assert_eq!(mini.priority, 1);
        assert_eq!(mini.role_count, 1);
    }

    #[test]
    fn owner_prefers_annotation_scheduler() {
        let pod = PodSnapshot::new("ns", "a").with_scheduler_name("default-scheduler");
        let mut mini = MiniGroup::singleton(&pod);
        assert_eq!(mini.owner(&pod), "default-scheduler");
        mini.scheduler_name = Some("podgang".to_string());
        assert_eq!(mini.owner(&pod), "podgang");
    }

    #[test]
    fn annotation_survives_serialization() {
        let mini = MiniGroup {
            group: "g".into(),
            role: "master".into(),
            min_replicas: 1,
            max_replicas: 2,
            priority: 5,
            role_count: 2,
            scheduler_name: None,
        };
        let raw = serde_json::to_string(&mini).unwrap();
        assert!(raw.contains("\"MinReplicas\":1"));
        assert_eq!(MiniGroup::parse(&raw).unwrap(), mini);
    }
}
