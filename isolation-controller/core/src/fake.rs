//! An in-memory [`ClusterClient`] for tests.
//!
//! Policies and deployments live in maps keyed by `(namespace, name)`. Failures
//! can be injected per policy name; every call is journaled so tests can assert
//! on what was (or wasn't) sent to the cluster.

use crate::{
    k8s::{self, labels, Labels, ResourceExt},
    selector, ClientError, ClusterClient, ListFilter,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

type Key = (String, String);

#[derive(Debug, Default)]
pub struct FakeClient {
    state: Mutex<State>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ListDeployments { namespace: String },
    ListNetworkPolicies { namespace: String },
    Create { namespace: String, name: String },
    Delete { namespace: String, name: String },
    Healthz,
    ServerVersion,
}

#[derive(Debug)]
struct State {
    policies: BTreeMap<Key, k8s::NetworkPolicy>,
    deployments: BTreeMap<Key, k8s::Deployment>,
    next_uid: u64,
    create_failures: HashMap<String, ClientError>,
    delete_failures: HashMap<String, ClientError>,
    list_failure: Option<ClientError>,
    healthz: Result<(), ClientError>,
    version: Result<String, ClientError>,
    calls: Vec<Call>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            policies: BTreeMap::new(),
            deployments: BTreeMap::new(),
            next_uid: 1,
            create_failures: HashMap::new(),
            delete_failures: HashMap::new(),
            list_failure: None,
            healthz: Ok(()),
            version: Ok("v1.33.0".to_string()),
            calls: Vec::new(),
        }
    }
}

// === impl FakeClient ===

impl FakeClient {
    /// Stores a policy directly, bypassing failure injection and the journal.
    /// Returns the stored object with its assigned UID.
    pub fn insert(&self, mut policy: k8s::NetworkPolicy) -> k8s::NetworkPolicy {
        let mut state = self.state.lock();
        state.assign_uid(&mut policy.metadata);
        state.policies.insert(key(&policy), policy.clone());
        policy
    }

    pub fn insert_deployment(&self, mut deployment: k8s::Deployment) -> k8s::Deployment {
        let mut state = self.state.lock();
        state.assign_uid(&mut deployment.metadata);
        state.deployments.insert(key(&deployment), deployment.clone());
        deployment
    }

    /// The `(namespace, name)` of every stored policy, in order.
    pub fn policy_ids(&self) -> Vec<(String, String)> {
        self.state.lock().policies.keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Fails every creation of a policy named `name`.
    pub fn fail_create(&self, name: &str, error: ClientError) {
        self.state
            .lock()
            .create_failures
            .insert(name.to_string(), error);
    }

    /// Fails every deletion of a policy named `name`.
    pub fn fail_delete(&self, name: &str, error: ClientError) {
        self.state
            .lock()
            .delete_failures
            .insert(name.to_string(), error);
    }

    /// Fails every list call.
    pub fn fail_list(&self, error: ClientError) {
        self.state.lock().list_failure = Some(error);
    }

    pub fn set_healthz(&self, result: Result<(), ClientError>) {
        self.state.lock().healthz = result;
    }
}

#[async_trait::async_trait]
impl ClusterClient for FakeClient {
    async fn list_deployments(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<k8s::Deployment>, ClientError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ListDeployments {
            namespace: namespace.to_string(),
        });
        if let Some(error) = state.list_failure.clone() {
            return Err(error);
        }
        filtered(state.deployments.values(), namespace, filter)
    }

    async fn list_network_policies(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<k8s::NetworkPolicy>, ClientError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ListNetworkPolicies {
            namespace: namespace.to_string(),
        });
        if let Some(error) = state.list_failure.clone() {
            return Err(error);
        }
        filtered(state.policies.values(), namespace, filter)
    }

    async fn create_network_policy(
        &self,
        mut policy: k8s::NetworkPolicy,
    ) -> Result<k8s::NetworkPolicy, ClientError> {
        let mut state = self.state.lock();
        let key = key(&policy);
        state.calls.push(Call::Create {
            namespace: key.0.clone(),
            name: key.1.clone(),
        });
        if let Some(error) = state.create_failures.get(&key.1) {
            return Err(error.clone());
        }
        if state.policies.contains_key(&key) {
            return Err(ClientError::AlreadyExists {
                kind: "NetworkPolicy",
                name: format!("{}/{}", key.0, key.1),
            });
        }
        state.assign_uid(&mut policy.metadata);
        state.policies.insert(key, policy.clone());
        Ok(policy)
    }

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Delete {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if let Some(error) = state.delete_failures.get(name) {
            return Err(error.clone());
        }
        state
            .policies
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound {
                kind: "NetworkPolicy",
                name: format!("{namespace}/{name}"),
            })
    }

    async fn healthz(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Healthz);
        state.healthz.clone()
    }

    async fn server_version(&self) -> Result<String, ClientError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ServerVersion);
        state.version.clone()
    }
}

// === impl State ===

impl State {
    fn assign_uid(&mut self, meta: &mut k8s::ObjectMeta) {
        if meta.uid.is_none() {
            meta.uid = Some(format!("00000000-0000-0000-0000-{:012}", self.next_uid));
            self.next_uid += 1;
        }
    }
}

fn key<T: ResourceExt>(obj: &T) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Applies a namespace and the subset of selector syntax the controller uses:
/// equality label selectors and `metadata.name`/`metadata.namespace` fields.
fn filtered<'a, T>(
    objs: impl Iterator<Item = &'a T>,
    namespace: &str,
    filter: &ListFilter,
) -> Result<Vec<T>, ClientError>
where
    T: ResourceExt + Clone + 'a,
{
    let labels = filter
        .label_selector
        .as_deref()
        .map(|s| labels::Selector::from_map(selector::parse(s)));
    let fields = filter
        .field_selector
        .as_deref()
        .map(selector::parse)
        .unwrap_or_default();
    if let Some(field) = fields
        .keys()
        .find(|k| *k != "metadata.name" && *k != "metadata.namespace")
    {
        return Err(ClientError::Api(format!(
            "field label not supported: {field}"
        )));
    }

    Ok(objs
        .filter(|obj| namespace.is_empty() || obj.namespace().as_deref() == Some(namespace))
        .filter(|obj| {
            labels.as_ref().map_or(true, |selector| {
                selector.matches(&Labels::from(obj.labels().clone()))
            })
        })
        .filter(|obj| {
            fields.iter().all(|(field, value)| match field.as_str() {
                "metadata.name" => obj.name_any() == *value,
                _ => obj.namespace().as_deref() == Some(value.as_str()),
            })
        })
        .cloned()
        .collect())
}
