//! Cluster health subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap (topology/bootstrap.rs):
//!     per-cluster outcome
//!     → record_topology_ready / record_topology_failed
//!
//! Publish (publisher/fanout.rs):
//!     per-cluster outcome
//!     → record_publish_success / record_publish_failure
//!
//! Operators:
//!     ClusterHealth::snapshot() + settix_cluster_healthy gauge
//! ```
//!
//! # Design Decisions
//! - Failures are still only logged; the registry adds visibility, not behaviour
//! - Health state is per-cluster, keyed by cluster identity

pub mod registry;
pub mod state;

pub use registry::ClusterHealth;
pub use state::{ClusterStatus, TopologyState};
