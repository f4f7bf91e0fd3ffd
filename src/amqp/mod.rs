//! AMQP transport capability.
//!
//! # Responsibilities
//! - Define the connection/channel seam the rest of the crate talks to
//! - Keep broker client types out of bootstrap, publisher and consumer
//!
//! # Data Flow
//! ```text
//! ConnectionFactory::create_connection(cluster)
//!     → Connection::create_channel()
//!     → Channel: declare / bind / publish / qos / consume / ack / close
//! ```
//!
//! # Design Decisions
//! - Object-safe async traits so fakes and the lapin adapter are interchangeable
//! - Connection recovery is not handled here; callers re-create on failure

pub mod types;

#[cfg(feature = "amqp")]
pub mod lapin_client;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::config::ClusterOptions;

pub use types::{
    AmqpError, AmqpResult, Delivery, ExchangeKind, HeaderValue, Headers, MessageProperties,
    QueueOptions,
};

/// Deliveries pushed by the broker for one subscription.
pub type DeliveryStream = BoxStream<'static, AmqpResult<Delivery>>;

/// Opens connections to a configured cluster.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create_connection(&self, cluster: &ClusterOptions) -> AmqpResult<Arc<dyn Connection>>;
}

/// An open broker connection.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn create_channel(&self) -> AmqpResult<Arc<dyn Channel>>;

    fn is_open(&self) -> bool;

    async fn close(&self) -> AmqpResult<()>;
}

/// A channel on an open connection.
#[async_trait]
pub trait Channel: Send + Sync {
    fn is_open(&self) -> bool;

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind, durable: bool) -> AmqpResult<()>;

    async fn declare_queue(&self, name: &str, options: QueueOptions) -> AmqpResult<()>;

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> AmqpResult<()>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: &[u8],
    ) -> AmqpResult<()>;

    /// Limit unacknowledged deliveries held by consumers on this channel.
    async fn set_prefetch(&self, count: u16) -> AmqpResult<()>;

    async fn consume(&self, queue: &str, consumer_tag: &str, auto_ack: bool) -> AmqpResult<DeliveryStream>;

    async fn ack(&self, delivery_tag: u64) -> AmqpResult<()>;

    /// Stop the broker from pushing to `consumer_tag`.
    async fn cancel(&self, consumer_tag: &str) -> AmqpResult<()>;

    async fn close(&self) -> AmqpResult<()>;
}
