//! Builds "allow everything except" ingress policies.
//!
//! NetworkPolicies only express allow rules and are additive: once any rule
//! admits a connection it is allowed. Blocking one workload is therefore
//! written as the complement of it, spread over three peers of a single
//! ingress rule:
//!
//! 1. any namespace other than the blocked workload's namespace;
//! 2. pods in the blocked namespace whose blocked labels hold other values;
//! 3. pods in the blocked namespace that carry none of the blocked label keys.
//!
//! Peer 2 uses one `NotIn` requirement per blocked label and peer 3 one
//! `DoesNotExist` requirement per blocked key; requirements within a peer are
//! ANDed. With a single blocked label this admits everything except pods
//! carrying that label value. With several labels a pod is only admitted when
//! it differs on every blocked key, so pods sharing any one blocked label pair
//! are refused as well.
//!
//! An empty blocked selector yields peers 2 and 3 without requirements, i.e.
//! `podSelector: {}`, which selects every pod in the blocked namespace.

use crate::{
    k8s::{self, labels, Labels, NAMESPACE_NAME_LABEL},
    naming, selector, Error, Result,
};
use serde::{Deserialize, Serialize};

/// Value of the managed-by label on every policy this controller creates.
pub const MANAGER: &str = "isolation-controller";

/// A set of workloads, identified by namespace and an equality label selector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct WorkloadTarget {
    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub label_selector: String,
}

/// An ingress-only policy protecting `target_selector` pods in `namespace`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsolationPolicy {
    pub name: String,
    pub namespace: String,
    pub target_selector: labels::Map,
    pub ingress: Vec<IngressRule>,
}

/// One source shape admitted by an [`IsolationPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngressRule {
    /// Any namespace except `blocked_namespace`.
    OtherNamespaces { blocked_namespace: String },

    /// Pods in `namespace` whose value for each key differs from `labels`.
    UnmatchedLabels { namespace: String, labels: labels::Map },

    /// Pods in `namespace` that carry none of `keys`.
    MissingKeys { namespace: String, keys: Vec<String> },
}

// === impl WorkloadTarget ===

impl WorkloadTarget {
    pub fn new(namespace: impl Into<String>, label_selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            label_selector: label_selector.into(),
        }
    }

    pub fn labels(&self) -> labels::Map {
        selector::parse(&self.label_selector)
    }

    /// The name of the policy that isolates other workloads from this one.
    pub fn blocking_policy_name(&self) -> String {
        naming::policy_name(&self.namespace, &self.label_selector)
    }

    pub(crate) fn validate(&self, field: &str) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::Validation(format!("{field}.namespace is required")));
        }
        Ok(())
    }
}

impl std::fmt::Display for WorkloadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.namespace, self.label_selector)
    }
}

// === impl IsolationPolicy ===

impl IsolationPolicy {
    /// Builds the policy that lives with `target` and refuses traffic from
    /// `blocked`.
    pub fn build(target: &WorkloadTarget, blocked: &WorkloadTarget) -> Self {
        let blocked_labels = blocked.labels();
        let keys = blocked_labels.keys().cloned().collect();
        Self {
            name: blocked.blocking_policy_name(),
            namespace: target.namespace.clone(),
            target_selector: target.labels(),
            ingress: vec![
                IngressRule::OtherNamespaces {
                    blocked_namespace: blocked.namespace.clone(),
                },
                IngressRule::UnmatchedLabels {
                    namespace: blocked.namespace.clone(),
                    labels: blocked_labels,
                },
                IngressRule::MissingKeys {
                    namespace: blocked.namespace.clone(),
                    keys,
                },
            ],
        }
    }

    /// Returns true if this policy lets a pod labeled `pod_labels` in
    /// namespace `namespace` connect to the selected pods.
    pub fn admits(&self, namespace: &str, pod_labels: &Labels) -> bool {
        let ns_labels = k8s::namespace_labels(namespace);
        self.ingress
            .iter()
            .any(|rule| rule.admits(&ns_labels, pod_labels))
    }

    /// Returns true if this policy applies to a pod labeled `pod_labels` in
    /// the policy's namespace.
    pub fn selects(&self, pod_labels: &Labels) -> bool {
        labels::Selector::from_map(self.target_selector.clone()).matches(pod_labels)
    }
}

impl From<IsolationPolicy> for k8s::NetworkPolicy {
    fn from(policy: IsolationPolicy) -> Self {
        let IsolationPolicy {
            name,
            namespace,
            target_selector,
            ingress,
        } = policy;
        k8s::NetworkPolicy {
            metadata: k8s::ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                labels: Some(
                    Some((k8s::MANAGED_BY_LABEL.to_string(), MANAGER.to_string()))
                        .into_iter()
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(k8s::NetworkPolicySpec {
                pod_selector: k8s::LabelSelector::from(labels::Selector::from_map(
                    target_selector,
                ))
                .into(),
                policy_types: Some(vec!["Ingress".to_string()]),
                ingress: Some(vec![k8s::NetworkPolicyIngressRule {
                    from: Some(ingress.into_iter().map(Into::into).collect()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

// === impl IngressRule ===

impl IngressRule {
    pub fn namespace_selector(&self) -> labels::Selector {
        match self {
            Self::OtherNamespaces { blocked_namespace } => {
                labels::Selector::from_expressions(vec![labels::Expression::not_in(
                    NAMESPACE_NAME_LABEL,
                    Some(blocked_namespace.clone()),
                )])
            }
            Self::UnmatchedLabels { namespace, .. } | Self::MissingKeys { namespace, .. } => {
                Some((NAMESPACE_NAME_LABEL.to_string(), namespace.clone()))
                    .into_iter()
                    .collect()
            }
        }
    }

    /// The pod selector, if the rule narrows pods at all.
    pub fn pod_selector(&self) -> Option<labels::Selector> {
        match self {
            Self::OtherNamespaces { .. } => None,
            Self::UnmatchedLabels {
                labels: blocked, ..
            } => Some(
                blocked
                    .iter()
                    .map(|(k, v)| labels::Expression::not_in(k.clone(), Some(v.clone())))
                    .collect(),
            ),
            Self::MissingKeys { keys, .. } => Some(
                keys.iter()
                    .map(|k| labels::Expression::does_not_exist(k.clone()))
                    .collect(),
            ),
        }
    }

    pub fn admits(&self, namespace_labels: &Labels, pod_labels: &Labels) -> bool {
        self.namespace_selector().matches(namespace_labels)
            && self
                .pod_selector()
                .map_or(true, |pods| pods.matches(pod_labels))
    }
}

impl From<IngressRule> for k8s::NetworkPolicyPeer {
    fn from(rule: IngressRule) -> Self {
        k8s::NetworkPolicyPeer {
            namespace_selector: Some(rule.namespace_selector().into()),
            pod_selector: rule.pod_selector().map(Into::into),
            ..Default::default()
        }
    }
}
