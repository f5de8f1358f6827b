#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;

pub use self::labels::Labels;
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentCondition, DeploymentSpec, DeploymentStatus},
        networking::v1::{
            NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicySpec,
        },
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement},
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams, ResourceExt},
    Client, Error, Resource,
};

/// Set by the API server on every namespace; its value is the namespace name.
pub const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

/// Marks the resources this controller creates.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Returns the labels the API server attaches to the namespace `name`.
pub fn namespace_labels(name: &str) -> Labels {
    Some((NAMESPACE_NAME_LABEL.to_string(), name.to_string()))
        .into_iter()
        .collect()
}
