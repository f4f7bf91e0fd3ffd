//! Publishing subsystem.
//!
//! # Data Flow
//! ```text
//! Publisher::publish(contract)
//!     → encode once (JSON)
//!     → for each cluster:
//!         routing key ← service key
//!         ChannelResolver::resolve(exchange, cluster, service key)
//!         PublishChannel::publish(persistent, settix-message-type header)
//!         → ClusterHealth + settix_publish_total
//!     → PublishReport
//! ```
//!
//! # Design Decisions
//! - Fanout is best-effort; one cluster failing never stops the others
//! - No publisher confirms; persistence and durable queues are the only guarantee
//! - The resolver exclusively owns publish channels

pub mod fanout;
pub mod resolver;

pub use fanout::{ClusterPublishOutcome, PublishError, PublishReport, Publisher};
pub use resolver::{ChannelKey, ChannelResolver, PublishChannel};
