//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal() returns
//!
//! Shutdown (shutdown.rs):
//!     trigger() → bootstrap stops between clusters
//!               → binary cancels consumers (drain, then close)
//! ```
//!
//! # Design Decisions
//! - One watch channel; late subscribers still observe a trigger
//! - Consumers drain in-flight work before their channel closes

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::wait_for_signal;
