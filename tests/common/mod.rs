//! Shared utilities for integration tests.
//!
//! - `start_management_api`: in-process management HTTP API on an ephemeral port
//! - `FakeBroker`: in-memory connection factory recording every AMQP operation

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;

use settix_rabbitmq::amqp::{
    AmqpError, AmqpResult, Channel, Connection, ConnectionFactory, Delivery, DeliveryStream,
    ExchangeKind, HeaderValue, Headers, MessageProperties, QueueOptions,
};
use settix_rabbitmq::config::{ClusterEndpointSet, ClusterOptions};
use settix_rabbitmq::consumer::{ConfigurationMessageProcessor, ProcessorError};
use settix_rabbitmq::contracts::{
    ConfigurationRequest, ConfigurationResponse, Contract, ContractKind,
    RemoveConfigurationRequest, RemoveConfigurationResponse, MESSAGE_TYPE_HEADER,
};

// --- Management API mock ---

#[derive(Debug, Default)]
pub struct ManagementState {
    pub vhosts: Mutex<BTreeSet<String>>,
    pub users: Mutex<BTreeSet<String>>,
    pub permissions: Mutex<Vec<(String, String, Value)>>,
    pub policies: Mutex<Vec<(String, String, Value)>>,
    pub upstreams: Mutex<Vec<(String, String, Value)>>,
    pub probes: AtomicUsize,
    pub api_calls: AtomicUsize,
    /// Answer every `/api` call with this status.
    pub forced_status: Mutex<Option<StatusCode>>,
}

impl ManagementState {
    fn enter(&self) -> Option<StatusCode> {
        self.api_calls.fetch_add(1, Ordering::SeqCst);
        *self.forced_status.lock().unwrap()
    }
}

pub struct MockManagementApi {
    pub addr: SocketAddr,
    pub state: Arc<ManagementState>,
    handle: JoinHandle<()>,
}

impl MockManagementApi {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections, simulating a dead node.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

/// Start a mock management API that knows `users` and the default vhost.
pub async fn start_management_api(users: &[&str]) -> MockManagementApi {
    let state = Arc::new(ManagementState::default());
    state.vhosts.lock().unwrap().insert("/".to_string());
    state
        .users
        .lock()
        .unwrap()
        .extend(users.iter().map(|u| u.to_string()));

    let app = Router::new()
        .route("/", get(probe))
        .route("/api/vhosts", get(list_vhosts))
        .route("/api/vhosts/{name}", get(get_vhost).put(put_vhost))
        .route("/api/users", get(list_users))
        .route("/api/users/{name}", get(get_user).put(put_user))
        .route("/api/permissions/{vhost}/{user}", put(put_permission))
        .route("/api/policies/{vhost}/{name}", put(put_policy))
        .route(
            "/api/parameters/federation-upstream/{vhost}/{name}",
            put(put_upstream),
        )
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockManagementApi {
        addr,
        state,
        handle,
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn probe(State(state): State<Arc<ManagementState>>) -> StatusCode {
    state.probes.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

fn vhost_json(name: &str) -> Value {
    json!({ "name": name, "description": "", "tracing": false })
}

fn user_json(name: &str) -> Value {
    json!({ "name": name, "tags": "administrator", "password_hash": "x", "hashing_algorithm": "rabbit_password_hashing_sha256" })
}

async fn list_vhosts(State(state): State<Arc<ManagementState>>) -> Result<Json<Value>, StatusCode> {
    if let Some(status) = state.enter() {
        return Err(status);
    }
    let vhosts: Vec<Value> = state.vhosts.lock().unwrap().iter().map(|v| vhost_json(v)).collect();
    Ok(Json(Value::Array(vhosts)))
}

async fn get_vhost(
    State(state): State<Arc<ManagementState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if let Some(status) = state.enter() {
        return Err(status);
    }
    if state.vhosts.lock().unwrap().contains(&name) {
        Ok(Json(vhost_json(&name)))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn put_vhost(State(state): State<Arc<ManagementState>>, Path(name): Path<String>) -> StatusCode {
    if let Some(status) = state.enter() {
        return status;
    }
    if state.vhosts.lock().unwrap().insert(name) {
        StatusCode::CREATED
    } else {
        StatusCode::NO_CONTENT
    }
}

/// Paged when `page` is present; `page_size` and `name` use snake_case.
async fn list_users(
    State(state): State<Arc<ManagementState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if let Some(status) = state.enter() {
        return Err(status);
    }
    let users: Vec<Value> = state
        .users
        .lock()
        .unwrap()
        .iter()
        .filter(|u| query.get("name").map_or(true, |name| *u == name))
        .map(|u| user_json(u))
        .collect();

    let Some(page) = query.get("page") else {
        return Ok(Json(Value::Array(users)));
    };
    let page: u32 = page.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let page_size: u32 = query
        .get("page_size")
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);
    Ok(Json(json!({
        "items": users,
        "page": page,
        "page_count": 1,
        "page_size": page_size,
        "total_count": state.users.lock().unwrap().len(),
        "filtered_count": users.len(),
    })))
}

async fn get_user(
    State(state): State<Arc<ManagementState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if let Some(status) = state.enter() {
        return Err(status);
    }
    if state.users.lock().unwrap().contains(&name) {
        Ok(Json(user_json(&name)))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn put_user(State(state): State<Arc<ManagementState>>, Path(name): Path<String>) -> StatusCode {
    if let Some(status) = state.enter() {
        return status;
    }
    if state.users.lock().unwrap().insert(name) {
        StatusCode::CREATED
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn put_permission(
    State(state): State<Arc<ManagementState>>,
    Path((vhost, user)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    if let Some(status) = state.enter() {
        return status;
    }
    state.permissions.lock().unwrap().push((vhost, user, body));
    StatusCode::CREATED
}

async fn put_policy(
    State(state): State<Arc<ManagementState>>,
    Path((vhost, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    if let Some(status) = state.enter() {
        return status;
    }
    state.policies.lock().unwrap().push((vhost, name, body));
    StatusCode::CREATED
}

async fn put_upstream(
    State(state): State<Arc<ManagementState>>,
    Path((vhost, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    if let Some(status) = state.enter() {
        return status;
    }
    state.upstreams.lock().unwrap().push((vhost, name, body));
    StatusCode::CREATED
}

// --- Cluster configuration ---

pub fn cluster(name: &str, api_address: &str) -> ClusterOptions {
    ClusterOptions {
        name: Some(name.to_string()),
        server: format!("{name}.rabbit.local"),
        api_address: Some(api_address.to_string()),
        username: "settix".to_string(),
        password: "secret".to_string(),
        vhost: "settix".to_string(),
        ..Default::default()
    }
}

pub fn clusters(names: &[&str]) -> ClusterEndpointSet {
    ClusterEndpointSet::new(
        names
            .iter()
            .map(|name| cluster(name, &format!("http://{name}.rabbit.local:15672")))
            .collect(),
    )
    .unwrap()
}

// --- In-memory AMQP ---

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConnectionOpened { cluster: String },
    ConnectionClosed { cluster: String },
    ChannelOpened { cluster: String, channel: usize },
    ChannelClosed { cluster: String, channel: usize },
    ExchangeDeclared { cluster: String, name: String, kind: ExchangeKind, durable: bool },
    QueueDeclared { cluster: String, name: String, options: QueueOptions },
    QueueBound { cluster: String, queue: String, exchange: String, routing_key: String },
    Published {
        cluster: String,
        channel: usize,
        exchange: String,
        routing_key: String,
        properties: MessageProperties,
        body: Vec<u8>,
    },
    Prefetch { cluster: String, count: u16 },
    Consume { cluster: String, queue: String, auto_ack: bool },
    Acked { cluster: String, delivery_tag: u64 },
    ConsumerCancelled { cluster: String },
    Processed { contract: ContractKind, tenant: String },
}

/// Records every operation; clusters can be told to fail.
#[derive(Debug, Default)]
pub struct FakeBroker {
    events: Mutex<Vec<Event>>,
    unreachable: Mutex<HashSet<String>>,
    failing_publish: Mutex<HashSet<String>>,
    channels: Mutex<Vec<Arc<FakeChannel>>>,
    pending_deliveries: Mutex<HashMap<usize, mpsc::UnboundedReceiver<AmqpResult<Delivery>>>>,
    next_channel: AtomicUsize,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// `create_connection` fails for this cluster.
    pub fn make_unreachable(&self, cluster: &str) {
        self.unreachable.lock().unwrap().insert(cluster.to_string());
    }

    pub fn make_reachable(&self, cluster: &str) {
        self.unreachable.lock().unwrap().remove(cluster);
    }

    /// `publish` fails and closes the channel for this cluster.
    pub fn fail_publishes(&self, cluster: &str) {
        self.failing_publish.lock().unwrap().insert(cluster.to_string());
    }

    pub fn channels(&self) -> Vec<Arc<FakeChannel>> {
        self.channels.lock().unwrap().clone()
    }

    pub fn published_clusters(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Published { cluster, .. } => Some(cluster),
                _ => None,
            })
            .collect()
    }

    pub fn connections_opened(&self, cluster: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::ConnectionOpened { cluster: c } if c == cluster))
            .count()
    }

    pub fn acked_tags(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Acked { delivery_tag, .. } => Some(delivery_tag),
                _ => None,
            })
            .collect()
    }

    pub fn processed(&self) -> Vec<ContractKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Processed { contract, .. } => Some(contract),
                _ => None,
            })
            .collect()
    }

    /// Channel with a delivery feed, for driving a consumer directly.
    pub fn channel(
        self: &Arc<Self>,
        cluster: &str,
    ) -> (Arc<FakeChannel>, mpsc::UnboundedSender<AmqpResult<Delivery>>) {
        let channel = self.open_channel(cluster);
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending_deliveries.lock().unwrap().insert(channel.id, rx);
        (channel, tx)
    }

    fn open_channel(self: &Arc<Self>, cluster: &str) -> Arc<FakeChannel> {
        let id = self.next_channel.fetch_add(1, Ordering::SeqCst);
        let channel = Arc::new(FakeChannel {
            broker: Arc::clone(self),
            cluster: cluster.to_string(),
            id,
            open: AtomicBool::new(true),
        });
        self.channels.lock().unwrap().push(Arc::clone(&channel));
        self.record(Event::ChannelOpened {
            cluster: cluster.to_string(),
            channel: id,
        });
        channel
    }
}

/// Factory handle over a shared broker.
pub struct FakeFactory(pub Arc<FakeBroker>);

#[async_trait]
impl ConnectionFactory for FakeFactory {
    async fn create_connection(&self, cluster: &ClusterOptions) -> AmqpResult<Arc<dyn Connection>> {
        let identity = cluster.identity();
        if self.0.unreachable.lock().unwrap().contains(&identity) {
            return Err(AmqpError::Connect {
                cluster: identity,
                reason: "connection refused".into(),
            });
        }
        self.0.record(Event::ConnectionOpened {
            cluster: identity.clone(),
        });
        Ok(Arc::new(FakeConnection {
            broker: Arc::clone(&self.0),
            cluster: identity,
            open: AtomicBool::new(true),
        }))
    }
}

pub struct FakeConnection {
    broker: Arc<FakeBroker>,
    cluster: String,
    open: AtomicBool,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn create_channel(&self) -> AmqpResult<Arc<dyn Channel>> {
        if !self.is_open() {
            return Err(AmqpError::ChannelClosed);
        }
        Ok(self.broker.open_channel(&self.cluster))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> AmqpResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.broker.record(Event::ConnectionClosed {
                cluster: self.cluster.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeChannel {
    broker: Arc<FakeBroker>,
    pub cluster: String,
    pub id: usize,
    open: AtomicBool,
}

impl FakeChannel {
    /// Close as if the broker dropped the channel.
    pub fn force_close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> AmqpResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AmqpError::ChannelClosed)
        }
    }
}

#[async_trait]
impl Channel for FakeChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind, durable: bool) -> AmqpResult<()> {
        self.ensure_open()?;
        self.broker.record(Event::ExchangeDeclared {
            cluster: self.cluster.clone(),
            name: name.to_string(),
            kind,
            durable,
        });
        Ok(())
    }

    async fn declare_queue(&self, name: &str, options: QueueOptions) -> AmqpResult<()> {
        self.ensure_open()?;
        self.broker.record(Event::QueueDeclared {
            cluster: self.cluster.clone(),
            name: name.to_string(),
            options,
        });
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> AmqpResult<()> {
        self.ensure_open()?;
        self.broker.record(Event::QueueBound {
            cluster: self.cluster.clone(),
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        });
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: &[u8],
    ) -> AmqpResult<()> {
        self.ensure_open()?;
        if self.broker.failing_publish.lock().unwrap().contains(&self.cluster) {
            self.force_close();
            return Err(AmqpError::operation("basic.publish", "connection reset"));
        }
        self.broker.record(Event::Published {
            cluster: self.cluster.clone(),
            channel: self.id,
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            properties,
            body: body.to_vec(),
        });
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> AmqpResult<()> {
        self.ensure_open()?;
        self.broker.record(Event::Prefetch {
            cluster: self.cluster.clone(),
            count,
        });
        Ok(())
    }

    async fn consume(&self, queue: &str, _consumer_tag: &str, auto_ack: bool) -> AmqpResult<DeliveryStream> {
        self.ensure_open()?;
        let rx = self
            .broker
            .pending_deliveries
            .lock()
            .unwrap()
            .remove(&self.id)
            .ok_or_else(|| AmqpError::operation("basic.consume", "no delivery feed"))?;
        self.broker.record(Event::Consume {
            cluster: self.cluster.clone(),
            queue: queue.to_string(),
            auto_ack,
        });

        Ok(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (delivery, rx))
        })
        .boxed())
    }

    async fn ack(&self, delivery_tag: u64) -> AmqpResult<()> {
        self.ensure_open()?;
        self.broker.record(Event::Acked {
            cluster: self.cluster.clone(),
            delivery_tag,
        });
        Ok(())
    }

    async fn cancel(&self, _consumer_tag: &str) -> AmqpResult<()> {
        self.broker.record(Event::ConsumerCancelled {
            cluster: self.cluster.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> AmqpResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.broker.record(Event::ChannelClosed {
                cluster: self.cluster.clone(),
                channel: self.id,
            });
        }
        Ok(())
    }
}

// --- Deliveries and processing ---

pub fn delivery(tag: u64, contract: Option<ContractKind>, body: Vec<u8>) -> Delivery {
    let mut headers = Headers::new();
    if let Some(kind) = contract {
        headers.insert(
            MESSAGE_TYPE_HEADER.to_string(),
            HeaderValue::Bytes(kind.contract_id().as_bytes().to_vec()),
        );
    }
    Delivery {
        delivery_tag: tag,
        redelivered: false,
        headers,
        body,
    }
}

pub fn request_delivery(tag: u64, tenant: &str) -> Delivery {
    let request = ConfigurationRequest::new(
        tenant,
        "giService",
        HashMap::from([("key1".to_string(), "value1".to_string())]),
        chrono::Utc::now(),
    );
    delivery(
        tag,
        Some(ContractKind::ConfigurationRequest),
        request.encode().unwrap(),
    )
}

/// Records processed contracts into the broker's event log.
///
/// With a gate, each message waits for a permit before returning.
pub struct RecordingProcessor {
    broker: Arc<FakeBroker>,
    gate: Option<Arc<Semaphore>>,
    pub started: Arc<Notify>,
}

impl RecordingProcessor {
    pub fn new(broker: Arc<FakeBroker>) -> Self {
        Self {
            broker,
            gate: None,
            started: Arc::new(Notify::new()),
        }
    }

    pub fn gated(broker: Arc<FakeBroker>, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(broker)
        }
    }

    async fn handle(&self, contract: ContractKind, tenant: &str) -> Result<(), ProcessorError> {
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        self.broker.record(Event::Processed {
            contract,
            tenant: tenant.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl ConfigurationMessageProcessor for RecordingProcessor {
    async fn process_configuration_request(
        &self,
        request: ConfigurationRequest,
    ) -> Result<(), ProcessorError> {
        self.handle(ContractKind::ConfigurationRequest, &request.tenant).await
    }

    async fn process_configuration_response(
        &self,
        response: ConfigurationResponse,
    ) -> Result<(), ProcessorError> {
        self.handle(ContractKind::ConfigurationResponse, &response.tenant).await
    }

    async fn process_remove_configuration_request(
        &self,
        request: RemoveConfigurationRequest,
    ) -> Result<(), ProcessorError> {
        self.handle(ContractKind::RemoveConfigurationRequest, &request.tenant).await
    }

    async fn process_remove_configuration_response(
        &self,
        response: RemoveConfigurationResponse,
    ) -> Result<(), ProcessorError> {
        self.handle(ContractKind::RemoveConfigurationResponse, &response.tenant).await
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
