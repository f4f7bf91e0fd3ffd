//! Contract identifiers and the encode/decode seam.
//!
//! The identifier travels in the `settix-message-type` header and selects the
//! payload shape on the receiving side. Identifiers are part of the wire
//! contract and never change for a given shape.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Header carrying the contract identifier.
pub const MESSAGE_TYPE_HEADER: &str = "settix-message-type";

/// The four payload shapes exchanged over the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    ConfigurationRequest,
    ConfigurationResponse,
    RemoveConfigurationRequest,
    RemoveConfigurationResponse,
}

impl ContractKind {
    pub const ALL: [ContractKind; 4] = [
        ContractKind::ConfigurationRequest,
        ContractKind::ConfigurationResponse,
        ContractKind::RemoveConfigurationRequest,
        ContractKind::RemoveConfigurationResponse,
    ];

    /// Stable wire identifier.
    ///
    /// Only the `ConfigurationResponse` id is taken from the deployed fleet. The
    /// other three are local and must be checked against peers before rollout.
    pub fn contract_id(self) -> &'static str {
        match self {
            ContractKind::ConfigurationRequest => "0e3c2f4a-6a0e-4f7b-9d35-1c4f0b8e2a91",
            ContractKind::ConfigurationResponse => "27a7bdea-6077-4201-a410-4e57c4e9fb65",
            ContractKind::RemoveConfigurationRequest => "8d1f5b7e-3c2a-4e69-b0d4-5a9e7c6f1b23",
            ContractKind::RemoveConfigurationResponse => "c4b9e2d1-7f3a-4a58-8e16-2d0b9f5c7a44",
        }
    }

    /// Resolve a header value back to a shape.
    pub fn from_contract_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.contract_id().eq_ignore_ascii_case(id))
    }

    pub fn name(self) -> &'static str {
        match self {
            ContractKind::ConfigurationRequest => "ConfigurationRequest",
            ContractKind::ConfigurationResponse => "ConfigurationResponse",
            ContractKind::RemoveConfigurationRequest => "RemoveConfigurationRequest",
            ContractKind::RemoveConfigurationResponse => "RemoveConfigurationResponse",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A payload that can travel over the broker.
pub trait Contract: Serialize + DeserializeOwned + fmt::Debug + Send + Sync {
    const KIND: ContractKind;

    fn contract_id() -> &'static str
    where
        Self: Sized,
    {
        Self::KIND.contract_id()
    }

    /// JSON-encode the payload.
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a JSON body.
    fn decode(body: &[u8]) -> Result<Self, serde_json::Error>
    where
        Self: Sized,
    {
        serde_json::from_slice(body)
    }
}

/// A payload that names the service it is routed to.
///
/// Responses do not implement this; the publisher takes their key explicitly.
pub trait KeyedContract: Contract {
    fn service_key(&self) -> &str;
}
