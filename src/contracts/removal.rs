//! Configuration-remove request and response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::contract::{Contract, ContractKind, KeyedContract};

/// Asks a service to drop configuration keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveConfigurationRequest {
    pub tenant: String,
    pub service_key: String,
    /// Keys (and their last known values) to remove.
    pub data: HashMap<String, String>,
    /// The service should restart after removing the keys.
    pub is_restart_required: bool,
    pub timestamp: DateTime<Utc>,
}

impl RemoveConfigurationRequest {
    pub fn new(
        tenant: impl Into<String>,
        service_key: impl Into<String>,
        data: HashMap<String, String>,
        is_restart_required: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            service_key: service_key.into(),
            data,
            is_restart_required,
            timestamp,
        }
    }
}

impl Contract for RemoveConfigurationRequest {
    const KIND: ContractKind = ContractKind::RemoveConfigurationRequest;
}

impl KeyedContract for RemoveConfigurationRequest {
    fn service_key(&self) -> &str {
        &self.service_key
    }
}

/// A service's answer to a [`RemoveConfigurationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveConfigurationResponse {
    pub tenant: String,
    pub request_payload: RemoveConfigurationRequest,
    pub is_success: bool,
    pub timestamp: DateTime<Utc>,
}

impl RemoveConfigurationResponse {
    pub fn for_request(
        request: RemoveConfigurationRequest,
        is_success: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant: request.tenant.clone(),
            request_payload: request,
            is_success,
            timestamp,
        }
    }
}

impl Contract for RemoveConfigurationResponse {
    const KIND: ContractKind = ContractKind::RemoveConfigurationResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_restart_flag() {
        let mut data = HashMap::new();
        data.insert("key1".to_string(), "value1".to_string());
        let request = RemoveConfigurationRequest::new("tenant", "giService", data, true, Utc::now());

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["IsRestartRequired"], true);
        assert_eq!(value["Data"]["key1"], "value1");

        let decoded = RemoveConfigurationRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn response_rejects_foreign_shapes() {
        let body = br#"{"Tenant":"t","ServiceKey":"s","Data":{},"Timestamp":"2024-03-01T12:00:00Z"}"#;
        assert!(RemoveConfigurationResponse::decode(body).is_err());
    }
}
