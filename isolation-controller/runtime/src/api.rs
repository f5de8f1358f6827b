use crate::{
    core::{
        self, ClientError, ClusterClient, DeploymentSnapshot, ErrorKind, ListFilter, PolicyRef,
        Reachability, WorkloadTarget,
    },
    k8s::{self, Resource},
};
use futures::future;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

pub type Body = http_body_util::Full<bytes::Bytes>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serves the isolation API over a [`ClusterClient`].
pub struct HttpApi<C> {
    client: Arc<C>,
    request_timeout: Duration,
    warn_on_error: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] BoxError),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Route {
    Healthz,
    Reachability,
    ListDeployments,
    ListPolicies,
    DeletePolicy,
    Block,
    Unblock,
}

/// Query parameters accepted by any route; each route reads the ones it needs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    namespace: Option<String>,
    label_selector: Option<String>,
    field_selector: Option<String>,
    detailed: Option<String>,
    uid: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockRequest {
    #[serde(default)]
    target_a: WorkloadTarget,
    #[serde(default)]
    target_b: WorkloadTarget,
}

enum Reply {
    Reachability(Reachability),
    Deployments(Vec<DeploymentView>),
    Policies(Vec<k8s::NetworkPolicy>),
    Status(&'static str),
    NoContent,
}

/// A deployment as listed by the API, annotated with its health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentView {
    api_version: String,
    kind: String,
    metadata: k8s::ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    spec: Option<k8s::DeploymentSpec>,
    status: k8s::DeploymentStatus,
    health: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: ErrorKind,
}

// === impl HttpApi ===

impl<C> HttpApi<C> {
    pub fn new(client: Arc<C>, request_timeout: Duration, warn_on_error: bool) -> Self {
        Self {
            client,
            request_timeout,
            warn_on_error,
        }
    }
}

impl<C> Clone for HttpApi<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            request_timeout: self.request_timeout,
            warn_on_error: self.warn_on_error,
        }
    }
}

impl<C, B> tower::Service<Request<B>> for HttpApi<C>
where
    C: ClusterClient + 'static,
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let route = match Route::recognize(req.method(), req.uri().path()) {
            Ok(route) => route,
            Err(status) => {
                debug!(method = %req.method(), path = req.uri().path(), %status, "No route");
                return Box::pin(future::ok(empty(status)));
            }
        };

        let api = self.clone();
        Box::pin(async move { api.handle(route, req).await })
    }
}

impl<C: ClusterClient + 'static> HttpApi<C> {
    async fn handle<B>(self, route: Route, req: Request<B>) -> Result<Response<Body>, Error>
    where
        B: hyper::body::Body,
        B::Error: Into<BoxError>,
    {
        debug!(?route, uri = %req.uri(), "Handling request");
        if route == Route::Healthz {
            return Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("ok"))
                .expect("healthz response must be valid"));
        }

        let params = match serde_urlencoded::from_str::<Params>(req.uri().query().unwrap_or("")) {
            Ok(params) => params,
            Err(error) => {
                return self.error_response(&core::Error::Validation(format!(
                    "malformed query: {error}"
                )))
            }
        };

        let targets = if matches!(route, Route::Block | Route::Unblock) {
            let bytes = req
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::Request(e.into()))?
                .to_bytes();
            match serde_json::from_slice::<BlockRequest>(&bytes) {
                Ok(targets) => Some(targets),
                Err(error) => {
                    return self.error_response(&core::Error::Validation(format!(
                        "malformed request body: {error}"
                    )))
                }
            }
        } else {
            None
        };
        trace!(?params, ?targets);

        let reply = self.dispatch(route, params, targets);
        match tokio::time::timeout(self.request_timeout, reply).await {
            Ok(Ok(reply)) => reply.into_response(),
            Ok(Err(error)) => self.error_response(&error),
            Err(_) => {
                let mut error = format!(
                    "request timed out after {}s",
                    self.request_timeout.as_secs_f64()
                );
                if route == Route::Block {
                    error.push_str("; the block continues and is rolled back if it fails");
                }
                self.log_error(&error, ErrorKind::Upstream);
                json_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    &ErrorBody {
                        error,
                        kind: ErrorKind::Upstream,
                    },
                )
            }
        }
    }

    async fn dispatch(
        &self,
        route: Route,
        params: Params,
        targets: Option<BlockRequest>,
    ) -> core::Result<Reply> {
        let client = &*self.client;
        let detailed = params.detailed.as_deref() == Some("true");
        let namespace = params.namespace.clone().unwrap_or_default();

        match (route, targets) {
            (Route::Reachability, _) => Ok(Reply::Reachability(client.check_connectivity().await)),

            (Route::ListDeployments, _) => {
                let filter = ListFilter::new(params.label_selector, params.field_selector);
                let deployments = client
                    .list_deployments(&namespace, &filter)
                    .await
                    .map_err(|e| core::Error::client("listing deployments", e))?;
                Ok(Reply::Deployments(
                    deployments
                        .into_iter()
                        .map(|d| DeploymentView::new(d, detailed))
                        .collect(),
                ))
            }

            (Route::ListPolicies, _) => {
                let filter = ListFilter::new(params.label_selector, None);
                let mut policies = client
                    .list_network_policies(&namespace, &filter)
                    .await
                    .map_err(|e| core::Error::client("listing network policies", e))?;
                if !detailed {
                    for policy in &mut policies {
                        policy.metadata.managed_fields = None;
                    }
                }
                Ok(Reply::Policies(policies))
            }

            (Route::DeletePolicy, _) => {
                let policy = PolicyRef::from_query(params.uid, params.namespace, params.name)?;
                core::lookup::delete_policy(client, &policy).await?;
                Ok(Reply::NoContent)
            }

            (Route::Block, Some(BlockRequest { target_a, target_b })) => {
                // Detached so that a request timeout can't interrupt a rollback.
                let client = self.client.clone();
                let saga =
                    tokio::spawn(async move { core::block(&*client, &target_a, &target_b).await });
                let blocked = saga.await.map_err(|e| {
                    core::Error::client("blocking workloads", ClientError::Api(e.to_string()))
                })??;
                debug!(policy_a = %blocked.policy_a, policy_b = %blocked.policy_b);
                Ok(Reply::Status("blocked"))
            }

            (Route::Unblock, Some(BlockRequest { target_a, target_b })) => {
                core::unblock(client, &target_a, &target_b)
                    .await?
                    .into_result()?;
                Ok(Reply::Status("unblocked"))
            }

            (route, _) => Err(core::Error::Validation(format!(
                "{route:?} requires a request body"
            ))),
        }
    }

    fn error_response(&self, error: &core::Error) -> Result<Response<Body>, Error> {
        let kind = error.kind();
        self.log_error(error, kind);
        json_response(
            status_for(kind),
            &ErrorBody {
                error: error.to_string(),
                kind,
            },
        )
    }

    fn log_error(&self, error: &dyn std::fmt::Display, kind: ErrorKind) {
        if self.warn_on_error {
            warn!(%error, %kind, "Request failed");
        } else {
            info!(%error, %kind, "Request failed");
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Upstream | ErrorKind::RollbackFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(body)?;
    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("json response must be valid"))
}

fn empty(status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("empty response must be valid")
}

// === impl Route ===

impl Route {
    fn recognize(method: &Method, path: &str) -> Result<Self, StatusCode> {
        match (method, path) {
            (&Method::GET, "/healthz") => Ok(Self::Healthz),
            (&Method::GET, "/api/v1/reachability") => Ok(Self::Reachability),
            (&Method::GET, "/api/v1/deployments") => Ok(Self::ListDeployments),
            (&Method::GET, "/api/v1/network/policies") => Ok(Self::ListPolicies),
            (&Method::DELETE, "/api/v1/network/policies") => Ok(Self::DeletePolicy),
            (&Method::POST, "/api/v1/network/block") => Ok(Self::Block),
            (&Method::DELETE, "/api/v1/network/block") => Ok(Self::Unblock),
            (
                _,
                "/healthz"
                | "/api/v1/reachability"
                | "/api/v1/deployments"
                | "/api/v1/network/policies"
                | "/api/v1/network/block",
            ) => Err(StatusCode::METHOD_NOT_ALLOWED),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }
}

// === impl Reply ===

impl Reply {
    fn into_response(self) -> Result<Response<Body>, Error> {
        match self {
            Self::Reachability(reachability) => {
                let status = if reachability.status {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                json_response(status, &reachability)
            }
            Self::Deployments(deployments) => json_response(StatusCode::OK, &deployments),
            Self::Policies(policies) => json_response(StatusCode::OK, &policies),
            Self::Status(status) => {
                json_response(StatusCode::OK, &serde_json::json!({ "status": status }))
            }
            Self::NoContent => Ok(empty(StatusCode::NO_CONTENT)),
        }
    }
}

// === impl DeploymentView ===

impl DeploymentView {
    fn new(deployment: k8s::Deployment, detailed: bool) -> Self {
        let health = core::classify(&DeploymentSnapshot::from(&deployment));
        let k8s::Deployment {
            mut metadata,
            spec,
            status,
        } = deployment;
        if !detailed {
            metadata.managed_fields = None;
        }
        Self {
            api_version: k8s::Deployment::api_version(&()).into_owned(),
            kind: k8s::Deployment::kind(&()).into_owned(),
            metadata,
            spec: spec.filter(|_| detailed),
            status: status.unwrap_or_default(),
            health,
        }
    }
}
