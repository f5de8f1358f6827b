use crate::{
    k8s::{self, ResourceExt},
    ClientError, ClusterClient, Error, ListFilter, Result,
};

/// Identifies a single network policy, either by UID or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyRef {
    Uid { namespace: String, uid: String },
    Name { namespace: String, name: String },
}

// === impl PolicyRef ===

impl PolicyRef {
    /// Resolves query parameters into a reference. A UID takes precedence over
    /// a name; empty values count as absent.
    pub fn from_query(
        uid: Option<String>,
        namespace: Option<String>,
        name: Option<String>,
    ) -> Result<Self> {
        let uid = uid.filter(|s| !s.is_empty());
        let namespace = namespace.filter(|s| !s.is_empty()).unwrap_or_default();
        let name = name.filter(|s| !s.is_empty());
        match (uid, name) {
            (Some(uid), _) => Ok(Self::Uid { namespace, uid }),
            (None, Some(name)) if !namespace.is_empty() => Ok(Self::Name { namespace, name }),
            _ => Err(Error::Validation(
                "either uid or both namespace and name are required".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uid { namespace, uid } if namespace.is_empty() => write!(f, "uid {uid}"),
            Self::Uid { namespace, uid } => write!(f, "uid {uid} in {namespace}"),
            Self::Name { namespace, name } => write!(f, "{namespace}/{name}"),
        }
    }
}

/// Finds the policy with `uid`, scanning `namespace` (or all namespaces when
/// empty).
pub async fn find_by_uid<C>(client: &C, namespace: &str, uid: &str) -> Result<k8s::NetworkPolicy>
where
    C: ClusterClient + ?Sized,
{
    let policies = client
        .list_network_policies(namespace, &ListFilter::default())
        .await
        .map_err(|source| Error::client("listing network policies", source))?;
    policies
        .into_iter()
        .find(|p| p.uid().as_deref() == Some(uid))
        .ok_or_else(|| {
            Error::client(
                "looking up network policy",
                ClientError::NotFound {
                    kind: "NetworkPolicy",
                    name: format!("with uid {uid}"),
                },
            )
        })
}

/// Deletes a single policy by reference, returning its `namespace/name`.
pub async fn delete_policy<C>(client: &C, policy: &PolicyRef) -> Result<String>
where
    C: ClusterClient + ?Sized,
{
    let (namespace, name) = match policy {
        PolicyRef::Name { namespace, name } => (namespace.clone(), name.clone()),
        PolicyRef::Uid { namespace, uid } => {
            let found = find_by_uid(client, namespace, uid).await?;
            (found.namespace().unwrap_or_default(), found.name_any())
        }
    };
    client
        .delete_network_policy(&namespace, &name)
        .await
        .map_err(|source| Error::client(format!("deleting network policy {policy}"), source))?;
    tracing::info!(%namespace, %name, "Deleted network policy");
    Ok(format!("{namespace}/{name}"))
}
