//! Channel resolver: one cached publish channel per (cluster, exchange).
//!
//! # Responsibilities
//! - Create a connection and channel on first use of a key
//! - Hand out the cached channel while it stays open
//! - Discard and replace a channel found closed
//! - Serialize publishes that share a channel
//!
//! # Design Decisions
//! - Each key owns an async mutex slot; concurrent first use creates one channel
//! - The map guard is never held across an await, only the slot's mutex is

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::amqp::{AmqpResult, Channel, Connection, ConnectionFactory, MessageProperties};
use crate::config::ClusterOptions;

/// Cache key. The service key never takes part in channel identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub cluster: String,
    pub exchange: String,
}

impl ChannelKey {
    pub fn new(cluster: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            exchange: exchange.into(),
        }
    }
}

struct CachedChannel {
    connection: Arc<dyn Connection>,
    channel: Arc<dyn Channel>,
    publish_lock: Arc<Mutex<()>>,
}

impl CachedChannel {
    fn is_open(&self) -> bool {
        self.channel.is_open() && self.connection.is_open()
    }

    fn holds(&self, handle: &PublishChannel) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.channel), Arc::as_ptr(&handle.channel))
    }

    fn handle(&self) -> PublishChannel {
        PublishChannel {
            channel: Arc::clone(&self.channel),
            publish_lock: Arc::clone(&self.publish_lock),
        }
    }

    async fn close(self, key: &ChannelKey) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!(cluster = %key.cluster, exchange = %key.exchange, error = %e, "Closing cached channel failed");
        }
        if let Err(e) = self.connection.close().await {
            tracing::debug!(cluster = %key.cluster, exchange = %key.exchange, error = %e, "Closing cached connection failed");
        }
    }
}

type Slot = Arc<Mutex<Option<CachedChannel>>>;

/// Shared handle to a cached publish channel.
#[derive(Clone)]
pub struct PublishChannel {
    channel: Arc<dyn Channel>,
    publish_lock: Arc<Mutex<()>>,
}

impl PublishChannel {
    /// Publish while holding the channel's publish lock.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: &[u8],
    ) -> AmqpResult<()> {
        let _guard = self.publish_lock.lock().await;
        self.channel.publish(exchange, routing_key, properties, body).await
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }
}

impl std::fmt::Debug for PublishChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishChannel")
            .field("open", &self.channel.is_open())
            .finish()
    }
}

/// Owns every cached publish channel.
pub struct ChannelResolver {
    factory: Arc<dyn ConnectionFactory>,
    slots: DashMap<ChannelKey, Slot>,
}

impl ChannelResolver {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            slots: DashMap::new(),
        }
    }

    /// Return the open channel for `(cluster, exchange)`, creating it if needed.
    pub async fn resolve(
        &self,
        exchange: &str,
        cluster: &ClusterOptions,
        service_key: &str,
    ) -> AmqpResult<PublishChannel> {
        let key = ChannelKey::new(cluster.identity(), exchange);
        let slot = self.slot(&key);
        let mut cached = slot.lock().await;

        if let Some(existing) = cached.as_ref() {
            if existing.is_open() {
                return Ok(existing.handle());
            }
        }

        if let Some(stale) = cached.take() {
            tracing::warn!(
                cluster = %key.cluster,
                exchange = %key.exchange,
                "Cached channel closed, replacing"
            );
            stale.close(&key).await;
        }

        let connection = self.factory.create_connection(cluster).await?;
        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close().await;
                return Err(e);
            }
        };

        tracing::info!(
            cluster = %key.cluster,
            exchange = %key.exchange,
            service_key = %service_key,
            "Publish channel created"
        );

        let entry = CachedChannel {
            connection,
            channel,
            publish_lock: Arc::new(Mutex::new(())),
        };
        let handle = entry.handle();
        *cached = Some(entry);
        Ok(handle)
    }

    /// Drop the cached channel for a key if it is still `failed` or has closed.
    ///
    /// A replacement opened by a concurrent resolve is left in place.
    pub async fn invalidate(&self, cluster: &str, exchange: &str, failed: &PublishChannel) {
        let key = ChannelKey::new(cluster, exchange);
        let Some(slot) = self.slots.get(&key).map(|entry| Arc::clone(entry.value())) else {
            return;
        };
        let stale = {
            let mut cached = slot.lock().await;
            match cached.as_ref() {
                Some(current) if current.holds(failed) || !current.is_open() => cached.take(),
                Some(_) => {
                    tracing::debug!(
                        cluster = %key.cluster,
                        exchange = %key.exchange,
                        "Cached channel already replaced, keeping it"
                    );
                    None
                }
                None => None,
            }
        };
        if let Some(stale) = stale {
            stale.close(&key).await;
        }
    }

    /// Number of keys holding an open channel.
    pub async fn len(&self) -> usize {
        let mut open = 0;
        for slot in self.snapshot() {
            if slot.1.lock().await.as_ref().is_some_and(CachedChannel::is_open) {
                open += 1;
            }
        }
        open
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every cached channel and connection.
    pub async fn close_all(&self) {
        for (key, slot) in self.snapshot() {
            let cached = slot.lock().await.take();
            if let Some(cached) = cached {
                cached.close(&key).await;
            }
        }
        self.slots.clear();
    }

    fn slot(&self, key: &ChannelKey) -> Slot {
        Arc::clone(self.slots.entry(key.clone()).or_default().value())
    }

    fn snapshot(&self) -> Vec<(ChannelKey, Slot)> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}

impl std::fmt::Debug for ChannelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelResolver")
            .field("keys", &self.slots.len())
            .finish()
    }
}
