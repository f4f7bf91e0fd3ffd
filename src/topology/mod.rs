//! Topology subsystem.
//!
//! # Data Flow
//! ```text
//! TopologyOrchestrator::bootstrap(service key), per cluster in order:
//!     shutdown requested?         → Cancelled, next cluster
//!     management API: vhost missing → create vhost + permission for the user
//!     fresh connection + channel
//!         → declare exchange (direct, durable)
//!         → declare queue (durable, shared, kept)
//!         → bind with the routing key
//!     close channel + connection
//!     → ClusterHealth + settix_bootstrap_total
//! ```
//!
//! # Design Decisions
//! - A failing cluster never aborts the run; partial topology beats none
//! - Bootstrap connections are never reused for publishing or consuming

pub mod bootstrap;
pub mod naming;

pub use bootstrap::{
    BootstrapError, BootstrapReport, BootstrapResult, ClusterBootstrapOutcome, TopologyOrchestrator,
};
pub use naming::{exchange_name, queue_name, routing_key, TopologyNames, EXCHANGE_NAME};
