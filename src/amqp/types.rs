//! Transport-neutral AMQP types and errors.

use std::borrow::Cow;
use std::collections::BTreeMap;

use thiserror::Error;

/// Errors raised by a transport implementation.
#[derive(Debug, Clone, Error)]
pub enum AmqpError {
    /// Opening a connection to a cluster failed.
    #[error("Connection to {cluster} failed: {reason}")]
    Connect { cluster: String, reason: String },

    /// A broker operation (declare, bind, publish, ack...) failed.
    #[error("AMQP {operation} failed: {reason}")]
    Operation {
        operation: &'static str,
        reason: String,
    },

    /// The channel was already closed.
    #[error("Channel is closed")]
    ChannelClosed,
}

impl AmqpError {
    pub fn operation(operation: &'static str, reason: impl ToString) -> Self {
        AmqpError::Operation {
            operation,
            reason: reason.to_string(),
        }
    }
}

/// Result type for transport operations.
pub type AmqpResult<T> = Result<T, AmqpError>;

/// Exchange types used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Direct,
    Fanout,
    Topic,
}

/// Queue declaration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueOptions {
    /// Survives broker restarts, shared, never removed by the broker.
    pub fn durable() -> Self {
        Self {
            durable: true,
            exclusive: false,
            auto_delete: false,
        }
    }
}

/// A message header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    /// AMQP long string; arrives as raw bytes.
    Bytes(Vec<u8>),
    Text(String),
    Bool(bool),
    Int(i64),
}

impl HeaderValue {
    /// Text view of string-like values.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            HeaderValue::Bytes(bytes) => Some(String::from_utf8_lossy(bytes)),
            HeaderValue::Text(text) => Some(Cow::Borrowed(text)),
            HeaderValue::Bool(_) | HeaderValue::Int(_) => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

pub type Headers = BTreeMap<String, HeaderValue>;

/// Publish properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageProperties {
    /// Delivery mode 2 when set.
    pub persistent: bool,
    pub content_type: Option<String>,
    pub headers: Headers,
}

impl MessageProperties {
    pub fn persistent() -> Self {
        Self {
            persistent: true,
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Delivery {
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_text_views() {
        assert_eq!(
            HeaderValue::Bytes(b"abc".to_vec()).as_text().as_deref(),
            Some("abc")
        );
        assert_eq!(HeaderValue::from("xyz").as_text().as_deref(), Some("xyz"));
        assert!(HeaderValue::Bool(true).as_text().is_none());
    }

    #[test]
    fn persistent_properties_builder() {
        let props = MessageProperties::persistent()
            .with_content_type("application/json")
            .with_header("settix-message-type", "id");
        assert!(props.persistent);
        assert_eq!(props.content_type.as_deref(), Some("application/json"));
        assert_eq!(props.headers.get("settix-message-type"), Some(&HeaderValue::from("id")));
    }

    #[test]
    fn durable_queue_flags() {
        let options = QueueOptions::durable();
        assert!(options.durable);
        assert!(!options.exclusive);
        assert!(!options.auto_delete);
    }
}
