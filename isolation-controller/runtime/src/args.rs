use crate::{
    api::HttpApi,
    client::KubeClient,
    core::{ClusterClient, Reachability},
    metrics, server,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{net::SocketAddr, sync::Arc};
use tokio::{sync::watch, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "isolation",
    about = "Blocks traffic between workloads with NetworkPolicies"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "isolation=info,warn",
        env = "ISOLATION_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(
        long,
        default_value = "0.0.0.0:8080",
        env = "ISOLATION_CONTROLLER_API_ADDR"
    )]
    api_addr: SocketAddr,

    /// Seconds a request may spend waiting on the Kubernetes API.
    #[clap(long, default_value = "10")]
    request_timeout: u64,

    /// Seconds in-flight requests are given to complete on shutdown.
    #[clap(long, default_value = "10")]
    graceful_timeout: u64,

    /// Seconds between Kubernetes API connectivity probes.
    #[clap(long, default_value = "30")]
    connectivity_poll_interval: u64,

    /// In `dev`, failed requests are logged at warn.
    #[clap(long, default_value = "dev", env = "ISOLATION_CONTROLLER_ENVIRONMENT")]
    environment: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            api_addr,
            request_timeout,
            graceful_timeout,
            connectivity_poll_interval,
            environment,
        } = self;

        let (reachability_tx, reachability_rx) = watch::channel(Reachability::default());

        let mut prom = <Registry>::default();
        metrics::register(&mut prom, reachability_rx);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let client = Arc::new(KubeClient::new(runtime.client()));
        let version = client
            .server_version()
            .await
            .context("failed to fetch the Kubernetes API server version")?;
        info!(%version, "Connected to Kubernetes API server");

        tokio::spawn(
            metrics::poll(
                client.clone(),
                Duration::from_secs(connectivity_poll_interval),
                reachability_tx,
            )
            .instrument(info_span!("connectivity")),
        );

        let api = HttpApi::new(
            client,
            Duration::from_secs(request_timeout),
            environment == "dev",
        );
        tokio::spawn(server::serve(
            api_addr,
            api,
            Duration::from_secs(graceful_timeout),
            runtime.shutdown_handle(),
        ));

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the API server to drain before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
