//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the settix
//! broker plumbing. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

use crate::config::validation::{validate_clusters, ValidationError};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SettixConfig {
    /// Broker clusters every message is fanned out to.
    pub rabbitmq: ClusterEndpointSet,

    /// The logical service this process provisions and consumes for.
    pub service: ServiceConfig,

    /// Consumer tuning.
    pub consumer: ConsumerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ordered list of broker clusters.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClusterEndpointSet {
    pub clusters: Vec<ClusterOptions>,
}

impl ClusterEndpointSet {
    /// Build a validated cluster set.
    ///
    /// Fails when the list is empty or any cluster lacks a usable management
    /// address or credentials.
    pub fn new(clusters: Vec<ClusterOptions>) -> Result<Self, Vec<ValidationError>> {
        let set = Self { clusters };
        validate_clusters(&set)?;
        Ok(set)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClusterOptions> {
        self.clusters.iter()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

impl<'a> IntoIterator for &'a ClusterEndpointSet {
    type Item = &'a ClusterOptions;
    type IntoIter = std::slice::Iter<'a, ClusterOptions>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

/// Connection settings for a single broker cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Cluster identity used for logging, metrics and channel caching.
    /// Defaults to `"{server}/{vhost}"`.
    pub name: Option<String>,

    /// AMQP broker host.
    pub server: String,

    /// AMQP port. `None` selects 5672, or 5671 with TLS.
    pub port: Option<u16>,

    /// Comma-separated management API addresses. Falls back to `server`.
    pub api_address: Option<String>,

    pub username: String,

    pub password: String,

    /// Virtual host the service topology lives in.
    pub vhost: String,

    /// Use TLS for both AMQP and the management API.
    pub use_ssl: bool,

    /// Timeout for management API calls in seconds.
    pub management_timeout_secs: u64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            name: None,
            server: "localhost".to_string(),
            port: None,
            api_address: None,
            username: String::new(),
            password: String::new(),
            vhost: "/".to_string(),
            use_ssl: false,
            management_timeout_secs: 20,
        }
    }
}

impl ClusterOptions {
    /// Stable identity of this cluster.
    pub fn identity(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("{}/{}", self.server, self.vhost),
        }
    }

    /// Raw management API address list.
    pub fn api_addresses(&self) -> &str {
        match &self.api_address {
            Some(addresses) if !addresses.trim().is_empty() => addresses,
            _ => &self.server,
        }
    }

    /// Effective AMQP port.
    pub fn amqp_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_ssl { 5671 } else { 5672 })
    }
}

/// Service identity settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service key used to derive the queue name and routing key.
    pub key: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            key: "giService".to_string(),
        }
    }
}

/// Consumer settings.
///
/// Prefetch is fixed at one.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Poll interval used while draining an in-flight delivery on stop.
    pub drain_poll_interval_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            drain_poll_interval_ms: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Fallback log filter when `RUST_LOG` is not set.
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Bind address for the Prometheus exporter.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "settix_rabbitmq=info,settix=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9464".to_string(),
        }
    }
}
