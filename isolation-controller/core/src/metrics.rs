use crate::Reachability;

pub const SERVER_VERSION: &str = "k8s_api_server_version";
pub const REACHABLE: &str = "k8s_api_reachable";
pub const DISCOVERABLE: &str = "k8s_api_discoverable";

/// Reported as the version label when the server version can't be fetched.
pub const UNKNOWN_VERSION: &str = "unknown";

/// A single gauge sample.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: i64,
}

/// Derives the connectivity gauges from the latest probe.
pub fn compute(reachability: &Reachability) -> Vec<MetricRecord> {
    let version = reachability
        .version
        .clone()
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
    vec![
        MetricRecord {
            name: SERVER_VERSION,
            help: "Version of the Kubernetes API server",
            labels: vec![("version", version)],
            value: 1,
        },
        MetricRecord {
            name: REACHABLE,
            help: "Whether the Kubernetes API server's health endpoint responds",
            labels: vec![],
            value: reachability.reachability as i64,
        },
        MetricRecord {
            name: DISCOVERABLE,
            help: "Whether the Kubernetes API server's version can be discovered",
            labels: vec![],
            value: reachability.discovery as i64,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;

    #[test]
    fn healthy_cluster() {
        let records = compute(&Reachability::from_probes(Ok(()), Ok("v1.33.1".to_string())));
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, SERVER_VERSION);
        assert_eq!(records[0].labels, vec![("version", "v1.33.1".to_string())]);
        assert_eq!(records[0].value, 1);
        assert_eq!(records[1].value, 1);
        assert_eq!(records[2].value, 1);
    }

    #[test]
    fn unknown_version_when_discovery_fails() {
        let records = compute(&Reachability::from_probes(
            Ok(()),
            Err(ClientError::Api("forbidden".to_string())),
        ));
        assert_eq!(records[0].labels, vec![("version", UNKNOWN_VERSION.to_string())]);
        assert_eq!(records[0].value, 1);
        assert_eq!((records[1].value, records[2].value), (1, 0));
    }

    #[test]
    fn nothing_probed_yet() {
        let records = compute(&Reachability::default());
        assert_eq!(records[0].labels, vec![("version", UNKNOWN_VERSION.to_string())]);
        assert_eq!((records[1].value, records[2].value), (0, 0));
    }
}
