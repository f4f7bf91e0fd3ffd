//! Best-effort fanout of contracts to every configured cluster.

use std::sync::Arc;

use thiserror::Error;

use crate::amqp::{AmqpError, MessageProperties};
use crate::config::{ClusterEndpointSet, ClusterOptions};
use crate::contracts::{Contract, ContractKind, KeyedContract, MESSAGE_TYPE_HEADER};
use crate::health::ClusterHealth;
use crate::observability::metrics;
use crate::publisher::resolver::ChannelResolver;
use crate::topology::naming;

/// Content type of every published body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Why a publish to one cluster failed.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Channel resolution failed: {0}")]
    Resolve(#[source] AmqpError),

    #[error("Publish failed: {0}")]
    Publish(#[source] AmqpError),
}

/// Outcome of publishing to a single cluster.
#[derive(Debug, Clone)]
pub struct ClusterPublishOutcome {
    pub cluster: String,
    pub result: Result<(), PublishError>,
}

/// Per-cluster outcomes of one publish call.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub contract: ContractKind,
    pub routing_key: String,
    pub outcomes: Vec<ClusterPublishOutcome>,
}

impl PublishReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.cluster.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &PublishError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.cluster.as_str(), e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Publishes contracts to the well-known exchange on every cluster.
pub struct Publisher {
    clusters: ClusterEndpointSet,
    resolver: Arc<ChannelResolver>,
    health: Arc<ClusterHealth>,
}

impl Publisher {
    pub fn new(
        clusters: ClusterEndpointSet,
        resolver: Arc<ChannelResolver>,
        health: Arc<ClusterHealth>,
    ) -> Self {
        Self {
            clusters,
            resolver,
            health,
        }
    }

    pub fn resolver(&self) -> &Arc<ChannelResolver> {
        &self.resolver
    }

    /// Publish a contract that carries its own service key.
    pub async fn publish<C: KeyedContract>(&self, message: &C) -> PublishReport {
        self.publish_with_key(message, message.service_key()).await
    }

    /// Publish to `service_key`'s queue on every cluster.
    ///
    /// Failures are logged per cluster and never stop the remaining clusters.
    pub async fn publish_with_key<C: Contract>(&self, message: &C, service_key: &str) -> PublishReport {
        let routing_key = naming::routing_key(service_key);
        let mut report = PublishReport {
            contract: C::KIND,
            routing_key: routing_key.clone(),
            outcomes: Vec::with_capacity(self.clusters.len()),
        };

        let body = match message.encode() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(contract = %C::KIND, error = %e, "Failed to serialize message");
                let error = PublishError::Serialization(e.to_string());
                for cluster in &self.clusters {
                    report.outcomes.push(ClusterPublishOutcome {
                        cluster: cluster.identity(),
                        result: Err(error.clone()),
                    });
                }
                return report;
            }
        };

        for cluster in &self.clusters {
            let identity = cluster.identity();
            let result = self
                .publish_to_cluster(cluster, &identity, C::KIND, service_key, &routing_key, &body)
                .await;

            match &result {
                Ok(()) => {
                    tracing::debug!(
                        cluster = %identity,
                        contract = %C::KIND,
                        routing_key = %routing_key,
                        "Message published"
                    );
                    self.health.record_publish_success(&identity);
                }
                Err(e) => {
                    tracing::error!(
                        cluster = %identity,
                        contract = %C::KIND,
                        routing_key = %routing_key,
                        error = %e,
                        "Failed to publish message"
                    );
                    self.health.record_publish_failure(&identity, &e.to_string());
                }
            }
            metrics::record_publish(&identity, C::KIND, result.is_ok());

            report.outcomes.push(ClusterPublishOutcome {
                cluster: identity,
                result,
            });
        }

        report
    }

    async fn publish_to_cluster(
        &self,
        cluster: &ClusterOptions,
        identity: &str,
        kind: ContractKind,
        service_key: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), PublishError> {
        let exchange = naming::exchange_name();
        let channel = self
            .resolver
            .resolve(exchange, cluster, service_key)
            .await
            .map_err(PublishError::Resolve)?;

        let properties = MessageProperties::persistent()
            .with_content_type(JSON_CONTENT_TYPE)
            .with_header(MESSAGE_TYPE_HEADER, kind.contract_id());

        if let Err(e) = channel.publish(exchange, routing_key, properties, body).await {
            if !channel.is_open() {
                self.resolver.invalidate(identity, exchange, &channel).await;
            }
            return Err(PublishError::Publish(e));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("clusters", &self.clusters.len())
            .finish()
    }
}
