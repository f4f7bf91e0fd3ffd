//! Management API client with host failover.
//!
//! # Responsibilities
//! - Provision vhosts, users, permissions, policies and federation upstreams
//! - Probe for a live management node before every call
//! - Remember the last node that answered and try it first next time
//!
//! # Failover
//! ```text
//! request
//!     → probe last known good (1s)      ok → use it
//!     → probe candidates in order (1s)  first ok → remember, use it
//!     → NoReachableHost(all candidates)
//! ```

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::ClusterOptions;
use crate::management::address::parse_api_addresses;
use crate::management::model::{
    FederatedExchange, ListQuery, Page, PermissionInfo, Policy, User, UserInfo, Vhost,
};
use crate::management::query::query_pairs;
use crate::management::types::{ManagementError, ManagementResult};

/// Default timeout for management calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for the liveness probe used during host discovery.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Client for a broker's management HTTP API.
pub struct ManagementClient {
    http: Client,
    api_addresses: Vec<Url>,
    /// Owned by this instance; swapped atomically by concurrent callers.
    last_known_address: ArcSwapOption<Url>,
    username: String,
    password: String,
    timeout: Duration,
    probe_timeout: Duration,
}

impl ManagementClient {
    /// Create a client for one or more comma-separated API addresses.
    ///
    /// Fails when no address is usable or a credential is empty.
    pub fn new(
        api_addresses: &str,
        username: &str,
        password: &str,
        use_tls: bool,
    ) -> ManagementResult<Self> {
        let addresses = parse_api_addresses(api_addresses, use_tls);
        if addresses.is_empty() {
            return Err(ManagementError::InvalidAddresses(api_addresses.to_string()));
        }
        if username.is_empty() {
            return Err(ManagementError::MissingCredential("username"));
        }
        if password.is_empty() {
            return Err(ManagementError::MissingCredential("password"));
        }

        // Keep-alive off: a pooled socket to a dead node would hide the failover.
        let http = Client::builder().pool_max_idle_per_host(0).build()?;

        Ok(Self {
            http,
            api_addresses: addresses,
            last_known_address: ArcSwapOption::empty(),
            username: username.to_string(),
            password: password.to_string(),
            timeout: DEFAULT_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
        })
    }

    /// Create a client from cluster configuration.
    pub fn from_cluster(options: &ClusterOptions) -> ManagementResult<Self> {
        Ok(Self::new(
            options.api_addresses(),
            &options.username,
            &options.password,
            options.use_ssl,
        )?
        .with_timeout(Duration::from_secs(options.management_timeout_secs)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Candidate addresses in configured order.
    pub fn api_addresses(&self) -> &[Url] {
        &self.api_addresses
    }

    /// The address that answered most recently, if any.
    pub fn last_known_address(&self) -> Option<Url> {
        self.last_known_address.load_full().map(|url| (*url).clone())
    }

    // --- Virtual hosts ---

    /// Create the virtual host if needed and return it.
    pub async fn ensure_virtual_host(&self, name: &str) -> ManagementResult<Vhost> {
        self.put::<()>(&["vhosts", name], None).await?;
        self.get_virtual_host(name).await
    }

    pub async fn get_virtual_host(&self, name: &str) -> ManagementResult<Vhost> {
        self.get(&["vhosts", name], Vec::new()).await
    }

    pub async fn list_virtual_hosts(&self) -> ManagementResult<Vec<Vhost>> {
        self.get(&["vhosts"], Vec::new()).await
    }

    // --- Users ---

    pub async fn list_users(&self) -> ManagementResult<Vec<User>> {
        self.get(&["users"], Vec::new()).await
    }

    /// List users one page at a time. `page` defaults to 1.
    pub async fn list_users_paged(&self, query: &ListQuery) -> ManagementResult<Page<User>> {
        let mut query = query.clone();
        if query.page.is_none() {
            query.page = Some(1);
        }
        self.get(&["users"], query_pairs(&query)?).await
    }

    pub async fn get_user(&self, name: &str) -> ManagementResult<User> {
        self.get(&["users", name], Vec::new()).await
    }

    /// Create or update a user and return the stored record.
    pub async fn create_user(&self, info: &UserInfo) -> ManagementResult<User> {
        self.put(&["users", info.name()], Some(info)).await?;
        self.get_user(info.name()).await
    }

    // --- Permissions, policies, federation ---

    pub async fn create_permission(&self, info: &PermissionInfo) -> ManagementResult<()> {
        self.put(&["permissions", info.vhost(), info.user()], Some(info))
            .await
    }

    pub async fn create_policy(&self, policy: &Policy, vhost: &str) -> ManagementResult<()> {
        self.put(&["policies", vhost, &policy.name], Some(policy)).await
    }

    pub async fn create_federated_exchange(
        &self,
        exchange: &FederatedExchange,
        vhost: &str,
    ) -> ManagementResult<()> {
        self.put(
            &["parameters", "federation-upstream", vhost, &exchange.name],
            Some(exchange),
        )
        .await
    }

    // --- Transport ---

    async fn put<B: Serialize>(&self, segments: &[&str], body: Option<&B>) -> ManagementResult<()> {
        let url = self.endpoint(segments, Vec::new()).await?;

        let mut request = self
            .http
            .put(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let status = request.send().await?.status();
        // 201 from current brokers, 204 from older ones, 200 is also a valid PUT answer.
        if !matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT
        ) {
            return Err(ManagementError::UnexpectedStatus {
                method: "PUT",
                path: url.path().to_string(),
                status,
            });
        }

        tracing::debug!(path = %url.path(), status = %status, "Management PUT succeeded");
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Vec<(String, String)>,
    ) -> ManagementResult<T> {
        let url = self.endpoint(segments, query).await?;

        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ManagementError::UnexpectedStatus {
                method: "GET",
                path: url.path().to_string(),
                status,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn endpoint(
        &self,
        segments: &[&str],
        query: Vec<(String, String)>,
    ) -> ManagementResult<Url> {
        let base = self.resolve_host().await?;
        build_endpoint(&base, segments, &query)
    }

    /// Find a live management node, preferring the last one that answered.
    async fn resolve_host(&self) -> ManagementResult<Url> {
        if let Some(last) = self.last_known_address.load_full() {
            if self.is_host_responding(&last).await {
                return Ok((*last).clone());
            }
            tracing::warn!(address = %last, "Last known management host stopped responding");
        }

        for address in &self.api_addresses {
            if self.is_host_responding(address).await {
                self.last_known_address.store(Some(Arc::new(address.clone())));
                tracing::debug!(address = %address, "Selected management host");
                return Ok(address.clone());
            }
        }

        Err(ManagementError::NoReachableHost(
            self.api_addresses.iter().map(Url::to_string).collect(),
        ))
    }

    async fn is_host_responding(&self, address: &Url) -> bool {
        match self
            .http
            .get(address.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!(address = %address, error = %e, "Management host probe failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementClient")
            .field("api_addresses", &self.api_addresses)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Build `{base}/api/{segments...}` with each segment percent-encoded.
///
/// The default vhost `/` therefore travels as `%2F`.
pub(crate) fn build_endpoint(
    base: &Url,
    segments: &[&str],
    query: &[(String, String)],
) -> ManagementResult<Url> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ManagementError::InvalidPath(base.to_string()))?;
        path.pop_if_empty().push("api");
        for segment in segments {
            path.push(segment);
        }
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}
