//! Shared registry of cluster health.

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::health::state::ClusterStatus;
use crate::observability::metrics;

/// Thread-safe map of cluster identity → status.
///
/// Bootstrap and publish write to it; operators read `snapshot()` to spot a
/// partially provisioned fleet.
#[derive(Debug, Default)]
pub struct ClusterHealth {
    clusters: DashMap<String, ClusterStatus>,
}

impl ClusterHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_topology_ready(&self, cluster: &str) {
        self.update(cluster, ClusterStatus::mark_topology_ready);
    }

    pub fn record_topology_failed(&self, cluster: &str, reason: &str) {
        self.update(cluster, |status| status.mark_topology_failed(reason));
    }

    pub fn record_publish_success(&self, cluster: &str) {
        self.update(cluster, ClusterStatus::mark_publish_success);
    }

    pub fn record_publish_failure(&self, cluster: &str, reason: &str) {
        self.update(cluster, |status| status.mark_publish_failure(reason));
    }

    pub fn status(&self, cluster: &str) -> Option<ClusterStatus> {
        self.clusters.get(cluster).map(|entry| entry.value().clone())
    }

    /// Copy of every recorded cluster, ordered by identity.
    pub fn snapshot(&self) -> BTreeMap<String, ClusterStatus> {
        self.clusters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn unhealthy_clusters(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|(_, status)| !status.is_healthy())
            .map(|(cluster, _)| cluster)
            .collect()
    }

    /// True when every listed cluster has a ready topology.
    pub fn is_fully_provisioned<'a>(&self, clusters: impl IntoIterator<Item = &'a str>) -> bool {
        clusters.into_iter().all(|cluster| {
            self.status(cluster)
                .is_some_and(|status| status.topology == crate::health::TopologyState::Ready)
        })
    }

    fn update(&self, cluster: &str, apply: impl FnOnce(&mut ClusterStatus)) {
        let healthy = {
            let mut entry = self.clusters.entry(cluster.to_string()).or_default();
            apply(entry.value_mut());
            entry.is_healthy()
        };
        metrics::record_cluster_health(cluster, healthy);
    }
}
