pub use isolation_controller_core as core;
pub use isolation_controller_k8s_api as k8s;

pub mod api;
mod args;
mod client;
mod metrics;
mod server;

pub use self::{api::HttpApi, args::Args, client::KubeClient};
