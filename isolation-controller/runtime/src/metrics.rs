use crate::core::{metrics, ClusterClient, Reachability};
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};
use std::sync::Arc;
use tokio::{
    sync::watch,
    time::{self, Duration, MissedTickBehavior},
};
use tracing::{debug, warn};

#[derive(Debug)]
struct Connectivity(watch::Receiver<Reachability>);

/// Registers gauges describing the most recent connectivity probe.
pub fn register(reg: &mut Registry, rx: watch::Receiver<Reachability>) {
    reg.register_collector(Box::new(Connectivity(rx)));
}

/// Probes the cluster every `interval`, publishing each result on `tx`.
///
/// Returns when every receiver has been dropped.
pub async fn poll<C>(client: Arc<C>, interval: Duration, tx: watch::Sender<Reachability>)
where
    C: ClusterClient + ?Sized,
{
    let mut ticks = time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        let reachability = client.check_connectivity().await;
        if reachability.status {
            debug!(version = ?reachability.version, "Kubernetes API is reachable");
        } else {
            warn!(
                error = reachability.error.as_deref().unwrap_or_default(),
                "Kubernetes API is unhealthy"
            );
        }
        if tx.send(reachability).is_err() {
            return;
        }
    }
}

impl Collector for Connectivity {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let reachability = self.0.borrow().clone();
        for record in metrics::compute(&reachability) {
            let gauge = ConstGauge::new(record.value);
            let mut metric_encoder =
                encoder.encode_descriptor(record.name, record.help, None, MetricType::Gauge)?;
            if record.labels.is_empty() {
                gauge.encode(metric_encoder)?;
            } else {
                gauge.encode(metric_encoder.encode_family(&record.labels)?)?;
            }
        }
        Ok(())
    }
}
