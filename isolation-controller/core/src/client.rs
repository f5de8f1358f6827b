use crate::{error::ClientError, k8s};
use serde::Serialize;

/// Narrows a list call. Both selectors are passed to the API server verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

/// Describes whether the cluster API can be reached and queried.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reachability {
    pub status: bool,
    pub reachability: bool,
    pub discovery: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The cluster operations the controller depends on.
///
/// An empty `namespace` lists across all namespaces. Implementations must not
/// retry or time out on their own; callers bound each call by dropping it.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_deployments(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<k8s::Deployment>, ClientError>;

    async fn list_network_policies(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<k8s::NetworkPolicy>, ClientError>;

    async fn create_network_policy(
        &self,
        policy: k8s::NetworkPolicy,
    ) -> Result<k8s::NetworkPolicy, ClientError>;

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// Probes the API server's `/healthz` endpoint.
    async fn healthz(&self) -> Result<(), ClientError>;

    async fn server_version(&self) -> Result<String, ClientError>;

    async fn check_connectivity(&self) -> Reachability {
        let healthz = self.healthz().await;
        let version = self.server_version().await;
        Reachability::from_probes(healthz, version)
    }
}

// === impl ListFilter ===

impl ListFilter {
    /// Builds a filter from optional query values, ignoring empty ones.
    pub fn new(label_selector: Option<String>, field_selector: Option<String>) -> Self {
        Self {
            label_selector: label_selector.filter(|s| !s.is_empty()),
            field_selector: field_selector.filter(|s| !s.is_empty()),
        }
    }
}

// === impl Reachability ===

impl Reachability {
    pub fn from_probes(
        healthz: Result<(), ClientError>,
        version: Result<String, ClientError>,
    ) -> Self {
        let mut errors = Vec::new();

        let reachability = match healthz {
            Ok(()) => true,
            Err(error) => {
                errors.push(format!("reachability error: {error}"));
                false
            }
        };

        let (discovery, version) = match version {
            Ok(version) => (true, Some(version)),
            Err(error) => {
                errors.push(format!("discovery error: {error}"));
                (false, None)
            }
        };

        Self {
            status: reachability && discovery,
            reachability,
            discovery,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_folds_probe_results() {
        let ok = Reachability::from_probes(Ok(()), Ok("v1.33.1".to_string()));
        assert_eq!(
            ok,
            Reachability {
                status: true,
                reachability: true,
                discovery: true,
                error: None,
                version: Some("v1.33.1".to_string()),
            }
        );

        let undiscoverable = Reachability::from_probes(
            Ok(()),
            Err(ClientError::Api("forbidden".to_string())),
        );
        assert!(!undiscoverable.status);
        assert!(undiscoverable.reachability);
        assert_eq!(
            undiscoverable.error.as_deref(),
            Some("discovery error: cluster API request failed: forbidden")
        );

        let down = Reachability::from_probes(
            Err(ClientError::Api("connection refused".to_string())),
            Err(ClientError::Api("connection refused".to_string())),
        );
        assert!(!down.status && !down.reachability && !down.discovery);
        assert_eq!(
            down.error.as_deref(),
            Some(
                "reachability error: cluster API request failed: connection refused; \
                 discovery error: cluster API request failed: connection refused"
            )
        );
    }

    #[test]
    fn empty_filter_values_are_ignored() {
        assert_eq!(
            ListFilter::new(Some(String::new()), None),
            ListFilter::default()
        );
        assert_eq!(
            ListFilter::new(Some("app=web".to_string()), Some(String::new())).label_selector,
            Some("app=web".to_string())
        );
    }

    #[test]
    fn reachability_omits_empty_fields() {
        let json = serde_json::to_value(Reachability::from_probes(
            Ok(()),
            Ok("v1.33.1".to_string()),
        ))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": true,
                "reachability": true,
                "discovery": true,
                "version": "v1.33.1",
            })
        );
    }
}
