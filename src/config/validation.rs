//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every cluster has credentials, a vhost and a usable management address
//! - Cluster identities are unique (they key the channel cache)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SettixConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{ClusterEndpointSet, SettixConfig};
use crate::management::address::parse_api_addresses;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no broker clusters configured")]
    NoClusters,

    #[error("cluster {cluster}: {field} is empty")]
    EmptyField { cluster: String, field: &'static str },

    #[error("cluster {cluster}: no valid management API address in '{addresses}'")]
    InvalidApiAddresses { cluster: String, addresses: String },

    #[error("cluster identity '{0}' is configured more than once")]
    DuplicateCluster(String),

    #[error("service key is empty")]
    EmptyServiceKey,

    #[error("consumer drain poll interval must be greater than zero")]
    ZeroDrainInterval,
}

/// Validate a full configuration.
pub fn validate_config(config: &SettixConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = match validate_clusters(&config.rabbitmq) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if config.service.key.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceKey);
    }
    if config.consumer.drain_poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroDrainInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the cluster list on its own.
pub fn validate_clusters(set: &ClusterEndpointSet) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if set.is_empty() {
        errors.push(ValidationError::NoClusters);
    }

    let mut seen = HashSet::new();
    for cluster in set {
        let identity = cluster.identity();

        for (field, value) in [
            ("server", &cluster.server),
            ("username", &cluster.username),
            ("password", &cluster.password),
            ("vhost", &cluster.vhost),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::EmptyField {
                    cluster: identity.clone(),
                    field,
                });
            }
        }

        if parse_api_addresses(cluster.api_addresses(), cluster.use_ssl).is_empty() {
            errors.push(ValidationError::InvalidApiAddresses {
                cluster: identity.clone(),
                addresses: cluster.api_addresses().to_string(),
            });
        }

        if !seen.insert(identity.clone()) {
            errors.push(ValidationError::DuplicateCluster(identity));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ClusterOptions;

    fn cluster(name: &str) -> ClusterOptions {
        ClusterOptions {
            name: Some(name.to_string()),
            server: "rabbit".into(),
            username: "settix".into(),
            password: "secret".into(),
            vhost: "settix".into(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_clusters() {
        let set = ClusterEndpointSet {
            clusters: vec![cluster("a"), cluster("b")],
        };
        assert!(validate_clusters(&set).is_ok());
    }

    #[test]
    fn rejects_empty_cluster_list() {
        let errors = validate_clusters(&ClusterEndpointSet::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoClusters]);
    }

    #[test]
    fn collects_every_error() {
        let mut broken = cluster("a");
        broken.username.clear();
        broken.password.clear();
        broken.api_address = Some("ftp://nope, ,".into());

        let set = ClusterEndpointSet {
            clusters: vec![broken, cluster("a")],
        };
        let errors = validate_clusters(&set).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::DuplicateCluster("a".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidApiAddresses { .. })));
    }

    #[test]
    fn validates_service_and_consumer_sections() {
        let mut config = SettixConfig::default();
        config.rabbitmq.clusters.push(cluster("a"));
        config.service.key = "  ".into();
        config.consumer.drain_poll_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::EmptyServiceKey, ValidationError::ZeroDrainInterval]
        );
    }
}
