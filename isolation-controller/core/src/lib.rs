#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod block;
mod client;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod health;
pub mod isolation;
pub mod lookup;
pub mod metrics;
pub mod naming;
pub mod selector;

pub use self::{
    block::{block, unblock, Blocked, Deletion, Unblocked},
    client::{ClusterClient, ListFilter, Reachability},
    error::{ClientError, Error, ErrorKind, Result},
    health::{classify, DeploymentSnapshot},
    isolation::{IngressRule, IsolationPolicy, WorkloadTarget},
    lookup::PolicyRef,
};
pub use isolation_controller_k8s_api as k8s;
