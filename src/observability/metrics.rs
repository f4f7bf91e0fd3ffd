//! Metrics collection and exposition.
//!
//! # Metrics
//! - `settix_bootstrap_total` (counter): bootstrap attempts by cluster, outcome
//! - `settix_publish_total` (counter): publishes by cluster, contract, outcome
//! - `settix_deliveries_total` (counter): consumed deliveries by contract, outcome
//! - `settix_cluster_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Exposed through the Prometheus exporter's own HTTP listener
//! - Cluster labels use the cluster identity from configuration

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::contracts::ContractKind;

/// Result of handling one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Processed,
    /// Acknowledged without processing.
    Dropped,
}

impl DeliveryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryOutcome::Processed => "processed",
            DeliveryOutcome::Dropped => "dropped",
        }
    }
}

/// Install the Prometheus recorder and start its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_bootstrap(cluster: &str, success: bool) {
    ::metrics::counter!(
        "settix_bootstrap_total",
        "cluster" => cluster.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

pub fn record_publish(cluster: &str, kind: ContractKind, success: bool) {
    ::metrics::counter!(
        "settix_publish_total",
        "cluster" => cluster.to_string(),
        "contract" => kind.name(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// `contract` is `"unknown"` when the header is missing or unrecognised.
pub fn record_delivery(contract: &'static str, result: DeliveryOutcome) {
    ::metrics::counter!(
        "settix_deliveries_total",
        "contract" => contract,
        "outcome" => result.as_str()
    )
    .increment(1);
}

pub fn record_cluster_health(cluster: &str, healthy: bool) {
    ::metrics::gauge!("settix_cluster_healthy", "cluster" => cluster.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
