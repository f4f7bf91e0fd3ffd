//! Consumer state machine and subscription handle.
//!
//! # States
//! ```text
//! Idle ──subscribe()──▶ Consuming ──cancel()──▶ Draining ──▶ Stopped
//! ```
//!
//! # Design Decisions
//! - Prefetch is fixed at one and acknowledgements are manual
//! - An in-flight counter is raised before dispatch and lowered by a guard
//! - `cancel()` detaches first, then waits for the counter to reach zero, then closes
//! - A delivery that arrives after detach is neither dispatched nor acked

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::amqp::{AmqpError, Channel, Connection, ConnectionFactory, DeliveryStream};
use crate::config::{ClusterOptions, ConsumerConfig};
use crate::consumer::dispatch;
use crate::consumer::processor::ConfigurationMessageProcessor;

/// Unacknowledged deliveries a consumer may hold.
pub const PREFETCH_COUNT: u16 = 1;

/// Lifecycle of a consumer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle = 0,
    Consuming = 1,
    Draining = 2,
    Stopped = 3,
}

impl From<u8> for ConsumerState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConsumerState::Consuming,
            2 => ConsumerState::Draining,
            3 => ConsumerState::Stopped,
            _ => ConsumerState::Idle,
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsumerState::Idle => "idle",
            ConsumerState::Consuming => "consuming",
            ConsumerState::Draining => "draining",
            ConsumerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Subscription set-up failures.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error(transparent)]
    Amqp(#[from] AmqpError),

    /// A consumer subscribes exactly once.
    #[error("Consumer is {0}, expected idle")]
    NotIdle(ConsumerState),
}

pub type ConsumeResult<T> = Result<T, ConsumeError>;

/// Consumes one queue on one channel.
pub struct Consumer {
    cluster: String,
    connection: Option<Arc<dyn Connection>>,
    channel: Arc<dyn Channel>,
    processor: Arc<dyn ConfigurationMessageProcessor>,
    drain_poll_interval: Duration,
    state: Arc<AtomicU8>,
}

impl Consumer {
    /// Wrap an existing channel. The caller keeps ownership of its connection.
    pub fn new(
        cluster: impl Into<String>,
        channel: Arc<dyn Channel>,
        processor: Arc<dyn ConfigurationMessageProcessor>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            connection: None,
            channel,
            processor,
            drain_poll_interval: Duration::from_millis(ConsumerConfig::default().drain_poll_interval_ms),
            state: Arc::new(AtomicU8::new(ConsumerState::Idle as u8)),
        }
    }

    /// Open a dedicated connection and channel to `cluster`.
    ///
    /// The connection is closed when the subscription is cancelled.
    pub async fn connect(
        factory: &dyn ConnectionFactory,
        cluster: &ClusterOptions,
        processor: Arc<dyn ConfigurationMessageProcessor>,
    ) -> ConsumeResult<Self> {
        let connection = factory.create_connection(cluster).await?;
        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close().await;
                return Err(e.into());
            }
        };

        let mut consumer = Self::new(cluster.identity(), channel, processor);
        consumer.connection = Some(connection);
        Ok(consumer)
    }

    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Start consuming `queue`: prefetch one, manual acknowledgements.
    pub async fn subscribe(&self, queue: &str) -> ConsumeResult<SubscriptionHandle> {
        if let Err(current) = self.state.compare_exchange(
            ConsumerState::Idle as u8,
            ConsumerState::Consuming as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            return Err(ConsumeError::NotIdle(ConsumerState::from(current)));
        }

        let consumer_tag = format!("settix-{}-{}", queue, uuid::Uuid::new_v4());
        let stream = match self.open_stream(queue, &consumer_tag).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state.store(ConsumerState::Idle as u8, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let (detach_tx, detach_rx) = watch::channel(false);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let listener = DeliveryListener {
            cluster: self.cluster.clone(),
            channel: Arc::clone(&self.channel),
            processor: Arc::clone(&self.processor),
            in_flight: Arc::clone(&in_flight),
            state: Arc::clone(&self.state),
        };
        let task = tokio::spawn(listener.run(stream, detach_rx));

        tracing::info!(
            cluster = %self.cluster,
            queue = %queue,
            consumer_tag = %consumer_tag,
            "Consumer subscribed"
        );

        Ok(SubscriptionHandle {
            cluster: self.cluster.clone(),
            consumer_tag,
            connection: self.connection.clone(),
            channel: Arc::clone(&self.channel),
            state: Arc::clone(&self.state),
            in_flight,
            detach: detach_tx,
            task: Some(task),
            drain_poll_interval: self.drain_poll_interval,
        })
    }

    async fn open_stream(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream, AmqpError> {
        self.channel.set_prefetch(PREFETCH_COUNT).await?;
        self.channel.consume(queue, consumer_tag, false).await
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("cluster", &self.cluster)
            .field("state", &self.state())
            .finish()
    }
}

struct DeliveryListener {
    cluster: String,
    channel: Arc<dyn Channel>,
    processor: Arc<dyn ConfigurationMessageProcessor>,
    in_flight: Arc<AtomicUsize>,
    state: Arc<AtomicU8>,
}

impl DeliveryListener {
    async fn run(self, mut stream: DeliveryStream, mut detach: watch::Receiver<bool>) {
        loop {
            let next = tokio::select! {
                biased;
                _ = detach.wait_for(|detached| *detached) => break,
                next = stream.next() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    tracing::error!(cluster = %self.cluster, error = %e, "Delivery stream failed");
                    break;
                }
                None => {
                    tracing::warn!(cluster = %self.cluster, "Delivery stream ended");
                    break;
                }
            };

            let _guard = InFlightGuard::enter(&self.in_flight);
            if *detach.borrow() {
                tracing::debug!(
                    cluster = %self.cluster,
                    delivery_tag = delivery.delivery_tag,
                    "Detached; leaving delivery for redelivery"
                );
                break;
            }

            dispatch::handle_delivery(
                &self.cluster,
                self.channel.as_ref(),
                self.processor.as_ref(),
                delivery,
            )
            .await;
        }

        // Stream ended on its own; nothing more will arrive.
        let _ = self.state.compare_exchange(
            ConsumerState::Consuming as u8,
            ConsumerState::Stopped as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Marks a delivery in flight until dropped.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to a running subscription.
///
/// Dropping the handle detaches the listener without draining or closing.
pub struct SubscriptionHandle {
    cluster: String,
    consumer_tag: String,
    connection: Option<Arc<dyn Connection>>,
    channel: Arc<dyn Channel>,
    state: Arc<AtomicU8>,
    in_flight: Arc<AtomicUsize>,
    detach: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    drain_poll_interval: Duration,
}

impl SubscriptionHandle {
    pub fn state(&self) -> ConsumerState {
        ConsumerState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Deliveries currently being processed (zero or one).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Graceful stop.
    ///
    /// Returns once no delivery is in flight and the channel is closed.
    pub async fn cancel(mut self) {
        self.state.store(ConsumerState::Draining as u8, Ordering::SeqCst);
        self.detach.send_replace(true);

        if self.channel.is_open() {
            if let Err(e) = self.channel.cancel(&self.consumer_tag).await {
                tracing::warn!(cluster = %self.cluster, consumer_tag = %self.consumer_tag, error = %e, "basic.cancel failed");
            }
        }

        while self.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(self.drain_poll_interval).await;
        }

        if let Err(e) = self.channel.close().await {
            tracing::warn!(cluster = %self.cluster, error = %e, "Failed to close consumer channel");
        }
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                tracing::warn!(cluster = %self.cluster, error = %e, "Failed to close consumer connection");
            }
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(cluster = %self.cluster, error = %e, "Consumer task failed");
            }
        }

        self.state.store(ConsumerState::Stopped as u8, Ordering::SeqCst);
        tracing::info!(cluster = %self.cluster, consumer_tag = %self.consumer_tag, "Consumer stopped");
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("cluster", &self.cluster)
            .field("consumer_tag", &self.consumer_tag)
            .field("state", &self.state())
            .finish()
    }
}
