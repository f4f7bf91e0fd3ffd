//! Management API payloads.
//!
//! Field names follow the management plugin's JSON. Unknown response fields are
//! ignored so newer broker versions keep deserializing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A broker virtual host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Vhost {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tracing: bool,
}

/// A broker user as returned by `GET /api/users`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub name: String,
    /// A comma-separated string on older brokers, an array on newer ones.
    #[serde(default)]
    pub tags: Value,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub hashing_algorithm: Option<String>,
}

/// Body for `PUT /api/users/{name}`.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    #[serde(skip)]
    name: String,
    pub password: String,
    /// Comma-separated tags, e.g. `"administrator"`.
    pub tags: String,
}

impl UserInfo {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            tags: String::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Body for `PUT /api/permissions/{vhost}/{user}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionInfo {
    #[serde(skip)]
    user: String,
    #[serde(skip)]
    vhost: String,
    pub configure: String,
    pub write: String,
    pub read: String,
}

impl PermissionInfo {
    /// Full access for `user` on `vhost`.
    pub fn new(user: &User, vhost: &Vhost) -> Self {
        Self::for_names(&user.name, &vhost.name)
    }

    pub fn for_names(user: impl Into<String>, vhost: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            vhost: vhost.into(),
            configure: ".*".to_string(),
            write: ".*".to_string(),
            read: ".*".to_string(),
        }
    }

    pub fn with_configure(mut self, pattern: impl Into<String>) -> Self {
        self.configure = pattern.into();
        self
    }

    pub fn with_write(mut self, pattern: impl Into<String>) -> Self {
        self.write = pattern.into();
        self
    }

    pub fn with_read(mut self, pattern: impl Into<String>) -> Self {
        self.read = pattern.into();
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn vhost(&self) -> &str {
        &self.vhost
    }
}

/// Body for `PUT /api/policies/{vhost}/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    #[serde(skip)]
    pub name: String,
    /// Regex matched against exchange/queue names.
    pub pattern: String,
    pub definition: Map<String, Value>,
    pub priority: i32,
    #[serde(rename = "apply-to")]
    pub apply_to: ApplyTo,
}

impl Policy {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, apply_to: ApplyTo) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            definition: Map::new(),
            priority: 0,
            apply_to,
        }
    }

    pub fn with_definition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.definition.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Objects a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyTo {
    All,
    Exchanges,
    Queues,
}

/// A federation upstream, `PUT /api/parameters/federation-upstream/{vhost}/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FederatedExchange {
    #[serde(skip)]
    pub name: String,
    pub value: FederationUpstream,
}

impl FederatedExchange {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FederationUpstream {
                uri: uri.into(),
                expires: None,
                message_ttl: None,
                ack_mode: None,
                trust_user_id: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FederationUpstream {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_user_id: Option<bool>,
}

/// Pagination and filtering for list endpoints.
///
/// Property names are converted to snake_case when sent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_regex: Option<bool>,
}

impl ListQuery {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            ..Default::default()
        }
    }

    pub fn matching(mut self, name: impl Into<String>, use_regex: bool) -> Self {
        self.name = Some(name.into());
        self.use_regex = Some(use_regex);
        self
    }
}

/// A paginated list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub filtered_count: u64,
}
