//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SettixConfig (validated, immutable)
//!     → cluster list shared with bootstrap, publisher and consumers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ClusterEndpointSet;
pub use schema::ClusterOptions;
pub use schema::ConsumerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServiceConfig;
pub use schema::SettixConfig;
pub use validation::ValidationError;
