//! Per-cluster health state.
//!
//! # States
//! - Unknown: bootstrap has not run for the cluster
//! - Ready: topology declared successfully
//! - Failed: the last bootstrap attempt failed
//!
//! # Design Decisions
//! - Purely observational: nothing in bootstrap or publish reads this state
//! - A cluster is healthy when its topology is not failed and its last publish succeeded

/// Topology provisioning state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TopologyState {
    #[default]
    Unknown,
    Ready,
    Failed(String),
}

/// Everything recorded for one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterStatus {
    pub topology: TopologyState,
    pub publish_successes: u64,
    pub publish_failures: u64,
    pub consecutive_publish_failures: u64,
    pub last_error: Option<String>,
}

impl ClusterStatus {
    pub fn is_healthy(&self) -> bool {
        !matches!(self.topology, TopologyState::Failed(_)) && self.consecutive_publish_failures == 0
    }

    pub(crate) fn mark_topology_ready(&mut self) {
        self.topology = TopologyState::Ready;
    }

    pub(crate) fn mark_topology_failed(&mut self, reason: &str) {
        self.topology = TopologyState::Failed(reason.to_string());
        self.last_error = Some(reason.to_string());
    }

    pub(crate) fn mark_publish_success(&mut self) {
        self.publish_successes += 1;
        self.consecutive_publish_failures = 0;
    }

    pub(crate) fn mark_publish_failure(&mut self, reason: &str) {
        self.publish_failures += 1;
        self.consecutive_publish_failures += 1;
        self.last_error = Some(reason.to_string());
    }
}
