//! Broker management API subsystem.
//!
//! # Data Flow
//! ```text
//! ClusterOptions.api_address ("a, b, c")
//!     → address.rs (normalize scheme/port, drop invalid)
//!     → client.rs (probe → last known good → candidates)
//!     → PUT/GET /api/... with basic auth
//!     → model.rs payloads
//! ```
//!
//! # Design Decisions
//! - Every call is idempotent: PUT creates or overwrites, GET reads back
//! - No retries beyond host failover; callers decide what a failure means
//! - Path segments are percent-encoded, so vhost `/` becomes `%2F`

pub mod address;
pub mod client;
pub mod model;
pub mod query;
pub mod types;

pub use client::ManagementClient;
pub use model::{FederatedExchange, ListQuery, Page, PermissionInfo, Policy, User, UserInfo, Vhost};
pub use types::{ManagementError, ManagementResult};
