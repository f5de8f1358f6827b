use crate::{
    core::{ClientError, ClusterClient, ListFilter},
    k8s::{self, Api, DeleteParams, ListParams, PostParams, ResourceExt},
};
use tracing::{debug, trace};

/// A [`ClusterClient`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClient {
    client: k8s::Client,
}

// === impl KubeClient ===

impl KubeClient {
    pub fn new(client: k8s::Client) -> Self {
        Self { client }
    }

    fn api<T>(&self, namespace: &str) -> Api<T>
    where
        T: k8s::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        T::DynamicType: Default,
    {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

impl std::fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClient").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ClusterClient for KubeClient {
    async fn list_deployments(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<k8s::Deployment>, ClientError> {
        let list = self
            .api::<k8s::Deployment>(namespace)
            .list(&list_params(filter))
            .await
            .map_err(|e| client_error(e, "Deployment", namespace))?;
        debug!(%namespace, count = list.items.len(), "Listed deployments");
        Ok(list.items)
    }

    async fn list_network_policies(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<k8s::NetworkPolicy>, ClientError> {
        let list = self
            .api::<k8s::NetworkPolicy>(namespace)
            .list(&list_params(filter))
            .await
            .map_err(|e| client_error(e, "NetworkPolicy", namespace))?;
        debug!(%namespace, count = list.items.len(), "Listed network policies");
        Ok(list.items)
    }

    async fn create_network_policy(
        &self,
        policy: k8s::NetworkPolicy,
    ) -> Result<k8s::NetworkPolicy, ClientError> {
        let namespace = policy.namespace().unwrap_or_default();
        let id = format!("{namespace}/{}", policy.name_any());
        trace!(?policy);
        self.api::<k8s::NetworkPolicy>(&namespace)
            .create(&PostParams::default(), &policy)
            .await
            .map_err(|e| client_error(e, "NetworkPolicy", &id))
    }

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.api::<k8s::NetworkPolicy>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| client_error(e, "NetworkPolicy", &format!("{namespace}/{name}")))?;
        Ok(())
    }

    async fn healthz(&self) -> Result<(), ClientError> {
        let req = http::Request::get("/healthz")
            .body(Vec::new())
            .map_err(|e| ClientError::Api(e.to_string()))?;
        let body = self
            .client
            .request_text(req)
            .await
            .map_err(|e| client_error(e, "healthz", "/healthz"))?;
        trace!(%body, "healthz");
        Ok(())
    }

    async fn server_version(&self) -> Result<String, ClientError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| client_error(e, "version", "/version"))?;
        Ok(info.git_version)
    }
}

fn list_params(filter: &ListFilter) -> ListParams {
    let mut params = ListParams::default();
    if let Some(labels) = filter.label_selector.as_deref() {
        params = params.labels(labels);
    }
    if let Some(fields) = filter.field_selector.as_deref() {
        params = params.fields(fields);
    }
    params
}

/// Classifies an API failure by its HTTP status.
fn client_error(error: k8s::Error, kind: &'static str, name: &str) -> ClientError {
    match &error {
        k8s::Error::Api(rsp) if rsp.code == 404 => ClientError::NotFound {
            kind,
            name: name.to_string(),
        },
        k8s::Error::Api(rsp) if rsp.code == 409 && rsp.reason == "AlreadyExists" => {
            ClientError::AlreadyExists {
                kind,
                name: name.to_string(),
            }
        }
        _ => ClientError::Api(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> k8s::Error {
        k8s::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("request failed with {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn classifies_by_status_code() {
        assert_eq!(
            client_error(api_error(404, "NotFound"), "NetworkPolicy", "ns/p"),
            ClientError::NotFound {
                kind: "NetworkPolicy",
                name: "ns/p".to_string(),
            }
        );
        assert_eq!(
            client_error(api_error(409, "AlreadyExists"), "NetworkPolicy", "ns/p"),
            ClientError::AlreadyExists {
                kind: "NetworkPolicy",
                name: "ns/p".to_string(),
            }
        );
        // An update conflict is not a name collision.
        assert!(matches!(
            client_error(api_error(409, "Conflict"), "NetworkPolicy", "ns/p"),
            ClientError::Api(_)
        ));
        assert!(matches!(
            client_error(api_error(403, "Forbidden"), "NetworkPolicy", "ns/p"),
            ClientError::Api(_)
        ));
    }

    #[test]
    fn message_text_is_not_inspected() {
        let error = k8s::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "networkpolicies \"p\" not found".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        });
        assert!(matches!(
            client_error(error, "NetworkPolicy", "ns/p"),
            ClientError::Api(_)
        ));
    }

    #[test]
    fn builds_list_params() {
        let params = list_params(&ListFilter::new(
            Some("app=web".to_string()),
            Some("metadata.name=web".to_string()),
        ));
        assert_eq!(params.label_selector.as_deref(), Some("app=web"));
        assert_eq!(params.field_selector.as_deref(), Some("metadata.name=web"));

        let params = list_params(&ListFilter::default());
        assert_eq!(params.label_selector, None);
        assert_eq!(params.field_selector, None);
    }
}
