//! Settix configuration propagation over RabbitMQ.
//!
//! Provisions a direct exchange and per-service queue on every configured
//! cluster, fans configuration contracts out to all clusters, and consumes
//! them one delivery at a time.

pub mod amqp;
pub mod config;
pub mod consumer;
pub mod contracts;
pub mod health;
pub mod lifecycle;
pub mod management;
pub mod observability;
pub mod publisher;
pub mod topology;

pub use config::{ClusterEndpointSet, ClusterOptions, SettixConfig};
pub use consumer::{ConfigurationMessageProcessor, Consumer, SubscriptionHandle};
pub use contracts::{
    ConfigurationRequest, ConfigurationResponse, RemoveConfigurationRequest,
    RemoveConfigurationResponse,
};
pub use health::ClusterHealth;
pub use lifecycle::Shutdown;
pub use management::ManagementClient;
pub use publisher::{ChannelResolver, Publisher};
pub use topology::TopologyOrchestrator;
