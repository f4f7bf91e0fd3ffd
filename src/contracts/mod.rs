//! Message contracts.
//!
//! # Wire Format
//! ```text
//! headers: { "settix-message-type": <contract id> }
//! body:    JSON, PascalCase property names, RFC 3339 timestamps
//! ```

pub mod configuration;
pub mod contract;
pub mod removal;

pub use configuration::{ConfigurationRequest, ConfigurationResponse};
pub use contract::{Contract, ContractKind, KeyedContract, MESSAGE_TYPE_HEADER};
pub use removal::{RemoveConfigurationRequest, RemoveConfigurationResponse};
