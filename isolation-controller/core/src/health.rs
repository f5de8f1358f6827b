use crate::k8s;

pub const AVAILABLE: &str = "Available";
pub const PROGRESSING: &str = "Progressing";

/// The replica counts and conditions a health verdict is derived from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeploymentSnapshot {
    pub desired_replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
    pub unavailable_replicas: i32,
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub kind: String,
    pub status: bool,
}

/// A deployment is healthy when every desired replica is ready and updated,
/// none is unavailable, and it reports both `Available` and `Progressing`.
pub fn classify(d: &DeploymentSnapshot) -> bool {
    d.ready_replicas == d.desired_replicas
        && d.updated_replicas == d.desired_replicas
        && d.unavailable_replicas == 0
        && d.has_condition(AVAILABLE)
        && d.has_condition(PROGRESSING)
}

impl DeploymentSnapshot {
    fn has_condition(&self, kind: &str) -> bool {
        self.conditions.iter().any(|c| c.kind == kind && c.status)
    }
}

impl From<&k8s::Deployment> for DeploymentSnapshot {
    fn from(deployment: &k8s::Deployment) -> Self {
        // An unset replica count is treated as zero rather than the
        // API server's default of one.
        let desired_replicas = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(0);
        let status = deployment.status.clone().unwrap_or_default();
        Self {
            desired_replicas,
            ready_replicas: status.ready_replicas.unwrap_or(0),
            updated_replicas: status.updated_replicas.unwrap_or(0),
            unavailable_replicas: status.unavailable_replicas.unwrap_or(0),
            conditions: status
                .conditions
                .unwrap_or_default()
                .into_iter()
                .map(|c| Condition {
                    kind: c.type_,
                    status: c.status == "True",
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(kind: &str, status: bool) -> Condition {
        Condition {
            kind: kind.to_string(),
            status,
        }
    }

    fn healthy() -> DeploymentSnapshot {
        DeploymentSnapshot {
            desired_replicas: 3,
            ready_replicas: 3,
            updated_replicas: 3,
            unavailable_replicas: 0,
            conditions: vec![condition(AVAILABLE, true), condition(PROGRESSING, true)],
        }
    }

    #[test]
    fn fully_rolled_out_deployment_is_healthy() {
        assert!(classify(&healthy()));
    }

    #[test]
    fn any_single_mismatch_is_unhealthy() {
        for (d, msg) in [
            (
                DeploymentSnapshot {
                    ready_replicas: 2,
                    ..healthy()
                },
                "ready below desired",
            ),
            (
                DeploymentSnapshot {
                    updated_replicas: 2,
                    ..healthy()
                },
                "rollout incomplete",
            ),
            (
                DeploymentSnapshot {
                    unavailable_replicas: 1,
                    ..healthy()
                },
                "unavailable replica",
            ),
            (
                DeploymentSnapshot {
                    desired_replicas: 4,
                    ..healthy()
                },
                "scaled up",
            ),
            (
                DeploymentSnapshot {
                    conditions: vec![condition(AVAILABLE, false), condition(PROGRESSING, true)],
                    ..healthy()
                },
                "not available",
            ),
            (
                DeploymentSnapshot {
                    conditions: vec![condition(AVAILABLE, true), condition(PROGRESSING, false)],
                    ..healthy()
                },
                "not progressing",
            ),
            (
                DeploymentSnapshot {
                    conditions: vec![condition(AVAILABLE, true)],
                    ..healthy()
                },
                "missing progressing",
            ),
            (
                DeploymentSnapshot {
                    conditions: vec![condition(PROGRESSING, true)],
                    ..healthy()
                },
                "missing available",
            ),
        ] {
            assert!(!classify(&d), "{msg}");
        }
    }

    #[test]
    fn condition_order_is_irrelevant() {
        let d = DeploymentSnapshot {
            conditions: vec![
                condition("ReplicaFailure", false),
                condition(PROGRESSING, true),
                condition(AVAILABLE, true),
            ],
            ..healthy()
        };
        assert!(classify(&d));
    }

    #[test]
    fn unset_replicas_default_to_zero() {
        let deployment = k8s::Deployment {
            spec: Some(k8s::DeploymentSpec::default()),
            status: Some(k8s::DeploymentStatus {
                conditions: Some(vec![
                    k8s::DeploymentCondition {
                        type_: AVAILABLE.to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    },
                    k8s::DeploymentCondition {
                        type_: PROGRESSING.to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let snapshot = DeploymentSnapshot::from(&deployment);
        assert_eq!(snapshot.desired_replicas, 0);
        assert!(classify(&snapshot));
    }

    #[test]
    fn condition_status_must_be_true() {
        let deployment = k8s::Deployment {
            spec: Some(k8s::DeploymentSpec {
                replicas: Some(1),
                ..Default::default()
            }),
            status: Some(k8s::DeploymentStatus {
                ready_replicas: Some(1),
                updated_replicas: Some(1),
                conditions: Some(vec![
                    k8s::DeploymentCondition {
                        type_: AVAILABLE.to_string(),
                        status: "Unknown".to_string(),
                        ..Default::default()
                    },
                    k8s::DeploymentCondition {
                        type_: PROGRESSING.to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!classify(&DeploymentSnapshot::from(&deployment)));
    }
}
