//! Topology orchestrator: provisions vhost, exchange, queue and binding on every cluster.

use std::sync::Arc;

use thiserror::Error;

use crate::amqp::{AmqpError, Channel, Connection, ConnectionFactory, ExchangeKind, QueueOptions};
use crate::config::{ClusterEndpointSet, ClusterOptions};
use crate::health::ClusterHealth;
use crate::lifecycle::ShutdownSignal;
use crate::management::{ManagementClient, ManagementError, PermissionInfo};
use crate::observability::metrics;
use crate::topology::naming::TopologyNames;

/// Why provisioning one cluster failed.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Management API: {0}")]
    Management(#[from] ManagementError),

    #[error(transparent)]
    Amqp(#[from] AmqpError),

    #[error("User {user} not found on {cluster}")]
    UserNotFound { cluster: String, user: String },

    /// Shutdown was requested before the cluster was reached.
    #[error("Bootstrap cancelled")]
    Cancelled,
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Outcome of provisioning one cluster.
#[derive(Debug)]
pub struct ClusterBootstrapOutcome {
    pub cluster: String,
    pub result: BootstrapResult<()>,
}

/// Per-cluster outcomes of one bootstrap run.
#[derive(Debug)]
pub struct BootstrapReport {
    pub names: TopologyNames,
    pub outcomes: Vec<ClusterBootstrapOutcome>,
}

impl BootstrapReport {
    pub fn ready(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.cluster.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &BootstrapError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.cluster.as_str(), e)))
    }

    pub fn all_ready(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Declares the service's topology on every configured cluster.
pub struct TopologyOrchestrator {
    clusters: ClusterEndpointSet,
    factory: Arc<dyn ConnectionFactory>,
    health: Arc<ClusterHealth>,
    shutdown: Option<ShutdownSignal>,
}

impl TopologyOrchestrator {
    pub fn new(
        clusters: ClusterEndpointSet,
        factory: Arc<dyn ConnectionFactory>,
        health: Arc<ClusterHealth>,
    ) -> Self {
        Self {
            clusters,
            factory,
            health,
            shutdown: None,
        }
    }

    /// Stop between clusters once `signal` fires.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Provision every cluster in order.
    ///
    /// A failing cluster is logged and skipped; the remaining clusters are
    /// still provisioned. Safe to repeat.
    pub async fn bootstrap(&self, service_key: &str) -> BootstrapReport {
        let names = TopologyNames::for_service(service_key);
        let mut outcomes = Vec::with_capacity(self.clusters.len());

        for cluster in &self.clusters {
            let identity = cluster.identity();

            if self.is_cancelled() {
                tracing::warn!(cluster = %identity, "Shutdown requested, skipping bootstrap");
                outcomes.push(ClusterBootstrapOutcome {
                    cluster: identity,
                    result: Err(BootstrapError::Cancelled),
                });
                continue;
            }

            let result = self.bootstrap_cluster(cluster, &identity, &names).await;
            match &result {
                Ok(()) => {
                    tracing::info!(
                        cluster = %identity,
                        exchange = %names.exchange,
                        queue = %names.queue,
                        routing_key = %names.routing_key,
                        "Topology ready"
                    );
                    self.health.record_topology_ready(&identity);
                }
                Err(e) => {
                    tracing::error!(cluster = %identity, error = %e, "Failed to bootstrap cluster");
                    self.health.record_topology_failed(&identity, &e.to_string());
                }
            }
            metrics::record_bootstrap(&identity, result.is_ok());

            outcomes.push(ClusterBootstrapOutcome {
                cluster: identity,
                result,
            });
        }

        BootstrapReport { names, outcomes }
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(ShutdownSignal::is_triggered)
    }

    async fn bootstrap_cluster(
        &self,
        cluster: &ClusterOptions,
        identity: &str,
        names: &TopologyNames,
    ) -> BootstrapResult<()> {
        ensure_virtual_host(cluster, identity).await?;

        let connection = self.factory.create_connection(cluster).await?;
        let declared = declare_topology(connection.as_ref(), names).await;
        if let Err(e) = connection.close().await {
            tracing::debug!(cluster = %identity, error = %e, "Failed to close bootstrap connection");
        }
        declared
    }
}

impl std::fmt::Debug for TopologyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyOrchestrator")
            .field("clusters", &self.clusters.len())
            .finish()
    }
}

/// Create the vhost and grant the configured user on it, if it is missing.
async fn ensure_virtual_host(cluster: &ClusterOptions, identity: &str) -> BootstrapResult<()> {
    let client = ManagementClient::from_cluster(cluster)?;

    let vhosts = client.list_virtual_hosts().await?;
    if vhosts.iter().any(|vhost| vhost.name == cluster.vhost) {
        return Ok(());
    }

    let vhost = client.ensure_virtual_host(&cluster.vhost).await?;
    let user = client
        .list_users()
        .await?
        .into_iter()
        .find(|user| user.name == cluster.username)
        .ok_or_else(|| BootstrapError::UserNotFound {
            cluster: identity.to_string(),
            user: cluster.username.clone(),
        })?;
    client
        .create_permission(&PermissionInfo::new(&user, &vhost))
        .await?;

    tracing::info!(cluster = %identity, vhost = %vhost.name, user = %user.name, "Virtual host created");
    Ok(())
}

async fn declare_topology(connection: &dyn Connection, names: &TopologyNames) -> BootstrapResult<()> {
    let channel = connection.create_channel().await?;
    let declared = declare_on(channel.as_ref(), names).await;
    if let Err(e) = channel.close().await {
        tracing::debug!(error = %e, "Failed to close bootstrap channel");
    }
    Ok(declared?)
}

async fn declare_on(channel: &dyn Channel, names: &TopologyNames) -> Result<(), AmqpError> {
    channel
        .declare_exchange(&names.exchange, ExchangeKind::Direct, true)
        .await?;
    channel
        .declare_queue(&names.queue, QueueOptions::durable())
        .await?;
    channel
        .bind_queue(&names.queue, &names.exchange, &names.routing_key)
        .await
}
