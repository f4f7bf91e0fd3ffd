//! Consuming subsystem.
//!
//! # Data Flow
//! ```text
//! Consumer::subscribe(queue)
//!     → basic.qos(prefetch 1) → basic.consume(no auto-ack)
//!     → listener task, one delivery at a time:
//!         in-flight guard → dispatch::handle_delivery
//!             → contract header → decode → processor
//!             → log + metrics, ack if channel open
//!
//! SubscriptionHandle::cancel()
//!     → detach listener → basic.cancel
//!     → poll until no delivery is in flight → close channel
//! ```
//!
//! # Design Decisions
//! - Processing failures never tear down the consumer
//! - Channel-level failures end the subscription; reconnecting is the caller's job

pub mod dispatch;
pub mod processor;
pub mod subscription;

pub use dispatch::{dispatch, handle_delivery, DispatchError};
pub use processor::{ConfigurationMessageProcessor, LoggingProcessor, ProcessorError};
pub use subscription::{
    ConsumeError, ConsumeResult, Consumer, ConsumerState, SubscriptionHandle, PREFETCH_COUNT,
};
