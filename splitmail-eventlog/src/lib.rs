//! Append-only event log for splitmail tracking events.
//!
//! Raw open/click events are recorded here before any aggregate is touched.
//! The log is the source of truth: experiment results can always be rebuilt
//! by replaying it from the beginning.
//!
//! # Key Types
//!
//! - [`EventLog`] - Trait for appending events and creating consumers
//! - [`EventConsumer`] - Trait for polling events with offset tracking
//! - [`InMemoryEventLog`] - In-process implementation of EventLog

pub mod error;
pub mod memory;
pub mod traits;

// Re-exports
pub use error::{Error, Result};
pub use memory::InMemoryEventLog;
pub use traits::{EventBatch, EventConsumer, EventLog, Offset, Partitionable, SeekPosition};
