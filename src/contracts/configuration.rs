//! Configuration-set request and response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::contract::{Contract, ContractKind, KeyedContract};

/// Asks a service to apply configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigurationRequest {
    pub tenant: String,
    pub service_key: String,
    pub data: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl ConfigurationRequest {
    pub fn new(
        tenant: impl Into<String>,
        service_key: impl Into<String>,
        data: HashMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            service_key: service_key.into(),
            data,
            timestamp,
        }
    }
}

impl Contract for ConfigurationRequest {
    const KIND: ContractKind = ContractKind::ConfigurationRequest;
}

impl KeyedContract for ConfigurationRequest {
    fn service_key(&self) -> &str {
        &self.service_key
    }
}

/// A service's answer to a [`ConfigurationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigurationResponse {
    pub tenant: String,
    /// The request being answered.
    pub request_payload: ConfigurationRequest,
    pub is_restart_required: bool,
    pub data: HashMap<String, String>,
    pub is_success: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConfigurationResponse {
    /// Build a response echoing `request`.
    pub fn for_request(
        request: ConfigurationRequest,
        is_success: bool,
        is_restart_required: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant: request.tenant.clone(),
            data: request.data.clone(),
            request_payload: request,
            is_restart_required,
            is_success,
            timestamp,
        }
    }
}

impl Contract for ConfigurationResponse {
    const KIND: ContractKind = ContractKind::ConfigurationResponse;
}
