//! Transport implementation backed by `lapin`.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, ConnectionProperties};
use url::Url;

use crate::amqp::{
    AmqpError, AmqpResult, Channel, Connection, ConnectionFactory, Delivery, DeliveryStream,
    ExchangeKind, HeaderValue, Headers, MessageProperties, QueueOptions,
};
use crate::config::ClusterOptions;

/// Opens real broker connections with `lapin`.
#[derive(Debug, Clone, Default)]
pub struct LapinConnectionFactory;

impl LapinConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for LapinConnectionFactory {
    async fn create_connection(&self, cluster: &ClusterOptions) -> AmqpResult<Arc<dyn Connection>> {
        let uri = amqp_uri(cluster)?;
        let connection = lapin::Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| AmqpError::Connect {
                cluster: cluster.identity(),
                reason: e.to_string(),
            })?;

        tracing::debug!(cluster = %cluster.identity(), "AMQP connection opened");
        Ok(Arc::new(LapinConnection { inner: connection }))
    }
}

/// Build the connection URI; credentials and vhost are percent-encoded.
pub fn amqp_uri(cluster: &ClusterOptions) -> AmqpResult<String> {
    let invalid = |reason: &str| AmqpError::Connect {
        cluster: cluster.identity(),
        reason: reason.to_string(),
    };

    let scheme = if cluster.use_ssl { "amqps" } else { "amqp" };
    let mut url = Url::parse(&format!(
        "{scheme}://{}:{}",
        cluster.server.trim(),
        cluster.amqp_port()
    ))
    .map_err(|_| invalid("invalid server address"))?;

    url.set_username(&cluster.username)
        .map_err(|_| invalid("cannot encode username"))?;
    url.set_password(Some(&cluster.password))
        .map_err(|_| invalid("cannot encode password"))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot encode vhost"))?
        .clear()
        .push(&cluster.vhost);

    Ok(url.to_string())
}

struct LapinConnection {
    inner: lapin::Connection,
}

#[async_trait]
impl Connection for LapinConnection {
    async fn create_channel(&self) -> AmqpResult<Arc<dyn Channel>> {
        let channel = self
            .inner
            .create_channel()
            .await
            .map_err(|e| AmqpError::operation("channel.open", e))?;
        Ok(Arc::new(LapinChannel { inner: channel }))
    }

    fn is_open(&self) -> bool {
        self.inner.status().connected()
    }

    async fn close(&self) -> AmqpResult<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.inner
            .close(200, "OK")
            .await
            .map_err(|e| AmqpError::operation("connection.close", e))
    }
}

struct LapinChannel {
    inner: lapin::Channel,
}

#[async_trait]
impl Channel for LapinChannel {
    fn is_open(&self) -> bool {
        self.inner.status().connected()
    }

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind, durable: bool) -> AmqpResult<()> {
        let kind = match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        };
        let options = ExchangeDeclareOptions {
            durable,
            ..Default::default()
        };
        self.inner
            .exchange_declare(name, kind, options, FieldTable::default())
            .await
            .map_err(|e| AmqpError::operation("exchange.declare", e))
    }

    async fn declare_queue(&self, name: &str, options: QueueOptions) -> AmqpResult<()> {
        let options = QueueDeclareOptions {
            durable: options.durable,
            exclusive: options.exclusive,
            auto_delete: options.auto_delete,
            ..Default::default()
        };
        self.inner
            .queue_declare(name, options, FieldTable::default())
            .await
            .map(|_| ())
            .map_err(|e| AmqpError::operation("queue.declare", e))
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> AmqpResult<()> {
        self.inner
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::operation("queue.bind", e))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: &[u8],
    ) -> AmqpResult<()> {
        self.inner
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                to_basic_properties(properties),
            )
            .await
            .map(|_| ())
            .map_err(|e| AmqpError::operation("basic.publish", e))
    }

    async fn set_prefetch(&self, count: u16) -> AmqpResult<()> {
        self.inner
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| AmqpError::operation("basic.qos", e))
    }

    async fn consume(&self, queue: &str, consumer_tag: &str, auto_ack: bool) -> AmqpResult<DeliveryStream> {
        let options = BasicConsumeOptions {
            no_ack: auto_ack,
            ..Default::default()
        };
        let consumer = self
            .inner
            .basic_consume(queue, consumer_tag, options, FieldTable::default())
            .await
            .map_err(|e| AmqpError::operation("basic.consume", e))?;

        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(from_lapin_delivery)
                    .map_err(|e| AmqpError::operation("basic.deliver", e))
            })
            .boxed())
    }

    async fn ack(&self, delivery_tag: u64) -> AmqpResult<()> {
        self.inner
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| AmqpError::operation("basic.ack", e))
    }

    async fn cancel(&self, consumer_tag: &str) -> AmqpResult<()> {
        self.inner
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| AmqpError::operation("basic.cancel", e))
    }

    async fn close(&self) -> AmqpResult<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.inner
            .close(200, "OK")
            .await
            .map_err(|e| AmqpError::operation("channel.close", e))
    }
}

fn to_basic_properties(properties: MessageProperties) -> BasicProperties {
    let mut headers = FieldTable::default();
    for (name, value) in properties.headers {
        headers.insert(ShortString::from(name), to_amqp_value(value));
    }

    let mut basic = BasicProperties::default().with_headers(headers);
    if properties.persistent {
        basic = basic.with_delivery_mode(2);
    }
    if let Some(content_type) = properties.content_type {
        basic = basic.with_content_type(ShortString::from(content_type));
    }
    basic
}

fn to_amqp_value(value: HeaderValue) -> AMQPValue {
    match value {
        HeaderValue::Bytes(bytes) => AMQPValue::LongString(LongString::from(bytes)),
        HeaderValue::Text(text) => AMQPValue::LongString(LongString::from(text.into_bytes())),
        HeaderValue::Bool(flag) => AMQPValue::Boolean(flag),
        HeaderValue::Int(number) => AMQPValue::LongLongInt(number),
    }
}

fn from_amqp_value(value: &AMQPValue) -> Option<HeaderValue> {
    match value {
        AMQPValue::LongString(text) => Some(HeaderValue::Bytes(text.as_bytes().to_vec())),
        AMQPValue::ShortString(text) => Some(HeaderValue::Text(text.as_str().to_string())),
        AMQPValue::Boolean(flag) => Some(HeaderValue::Bool(*flag)),
        AMQPValue::ShortInt(number) => Some(HeaderValue::Int(i64::from(*number))),
        AMQPValue::LongInt(number) => Some(HeaderValue::Int(i64::from(*number))),
        AMQPValue::LongLongInt(number) => Some(HeaderValue::Int(*number)),
        _ => None,
    }
}

fn from_lapin_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let mut headers = Headers::new();
    if let Some(table) = delivery.properties.headers() {
        for (name, value) in table.inner() {
            if let Some(value) = from_amqp_value(value) {
                headers.insert(name.as_str().to_string(), value);
            }
        }
    }

    Delivery {
        delivery_tag: delivery.delivery_tag,
        redelivered: delivery.redelivered,
        headers,
        body: delivery.data,
    }
}
