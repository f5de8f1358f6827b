use crate::{ClusterClient, Error, IsolationPolicy, Result, WorkloadTarget};
use tracing::{debug, error, info, warn};

/// The policies created by a successful [`block`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blocked {
    /// `namespace/name` of the policy protecting target A.
    pub policy_a: String,
    /// `namespace/name` of the policy protecting target B.
    pub policy_b: String,
}

/// The outcome of each deletion attempted by [`unblock`].
#[derive(Debug)]
pub struct Unblocked {
    pub policy_a: Deletion,
    pub policy_b: Deletion,
}

#[derive(Debug)]
pub struct Deletion {
    pub namespace: String,
    pub name: String,
    pub result: Result<()>,
}

/// Blocks traffic between two workloads in both directions.
///
/// Policy A (in A's namespace, refusing B) is always created first. If
/// creating policy B fails, policy A is deleted again so that either both
/// policies exist or neither does. A failed rollback is reported as
/// [`Error::RollbackFailed`]; policy A is then left behind.
pub async fn block<C>(client: &C, a: &WorkloadTarget, b: &WorkloadTarget) -> Result<Blocked>
where
    C: ClusterClient + ?Sized,
{
    a.validate("target_a")?;
    b.validate("target_b")?;

    let policy_a = IsolationPolicy::build(a, b);
    let policy_b = IsolationPolicy::build(b, a);
    let id_a = format!("{}/{}", policy_a.namespace, policy_a.name);
    let id_b = format!("{}/{}", policy_b.namespace, policy_b.name);
    let (ns_a, name_a) = (policy_a.namespace.clone(), policy_a.name.clone());

    debug!(policy = %id_a, "Creating policy A");
    client
        .create_network_policy(policy_a.into())
        .await
        .map_err(|source| Error::client(format!("creating policy A {id_a}"), source))?;

    debug!(policy = %id_b, "Creating policy B");
    if let Err(source) = client.create_network_policy(policy_b.into()).await {
        let context = format!("creating policy B {id_b}");
        warn!(error = %source, policy = %id_a, "Failed to create policy B; rolling back policy A");
        return match client.delete_network_policy(&ns_a, &name_a).await {
            Ok(()) => Err(Error::client(context, source)),
            Err(rollback) => {
                error!(error = %rollback, policy = %id_a, "Rollback failed; policy A remains");
                Err(Error::RollbackFailed {
                    context,
                    source,
                    rollback_name: id_a,
                    rollback,
                })
            }
        };
    }

    info!(%a, %b, "Blocked workloads");
    Ok(Blocked {
        policy_a: id_a,
        policy_b: id_b,
    })
}

/// Deletes the policies a [`block`] of the same pair created.
///
/// Both deletions are attempted even if the first fails; there is no
/// compensation, so a partial result leaves one policy in place.
pub async fn unblock<C>(client: &C, a: &WorkloadTarget, b: &WorkloadTarget) -> Result<Unblocked>
where
    C: ClusterClient + ?Sized,
{
    a.validate("target_a")?;
    b.validate("target_b")?;

    // Policy A lives with A and is named after B, and vice versa.
    let policy_a = delete(client, "A", &a.namespace, b.blocking_policy_name()).await;
    let policy_b = delete(client, "B", &b.namespace, a.blocking_policy_name()).await;

    if policy_a.result.is_ok() && policy_b.result.is_ok() {
        info!(%a, %b, "Unblocked workloads");
    }
    Ok(Unblocked { policy_a, policy_b })
}

async fn delete<C>(client: &C, which: &str, namespace: &str, name: String) -> Deletion
where
    C: ClusterClient + ?Sized,
{
    debug!(%namespace, %name, "Deleting policy {which}");
    let result = client
        .delete_network_policy(namespace, &name)
        .await
        .map_err(|source| {
            Error::client(format!("deleting policy {which} {namespace}/{name}"), source)
        });
    if let Err(error) = &result {
        info!(%error, "Failed to delete policy {which}");
    }
    Deletion {
        namespace: namespace.to_string(),
        name,
        result,
    }
}

// === impl Unblocked ===

impl Unblocked {
    pub fn is_complete(&self) -> bool {
        self.policy_a.result.is_ok() && self.policy_b.result.is_ok()
    }

    /// Collapses both deletions into a single result.
    ///
    /// When both failed, a failure other than absence is preferred so that a
    /// genuine error is never reported as "not found".
    pub fn into_result(self) -> Result<()> {
        match (self.policy_a.result, self.policy_b.result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(error), Ok(())) | (Ok(()), Err(error)) => Err(error),
            (Err(a), Err(b)) => match (a, b) {
                (
                    Error::NotFound {
                        context: ctx_a,
                        source,
                    },
                    Error::NotFound { context: ctx_b, .. },
                ) => Err(Error::NotFound {
                    context: format!("{ctx_a}; {ctx_b}"),
                    source,
                }),
                (Error::NotFound { .. }, error) => Err(error),
                (error, _) => Err(error),
            },
        }
    }
}
