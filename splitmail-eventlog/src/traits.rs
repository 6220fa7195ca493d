//! Core traits for event log operations.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Offset into an event stream.
pub type Offset = u64;

/// Position to seek to when positioning a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPosition {
    /// Start from the beginning.
    Beginning,
    /// Start from the end (new events only).
    End,
    /// Start from a specific offset.
    Offset(Offset),
}

/// Events that carry a partition key for ordered per-key processing.
pub trait Partitionable {
    /// Key used to route the event; `None` means any partition.
    fn partition_key(&self) -> Option<String>;
}

/// A batch of events returned from polling, each paired with its offset.
#[derive(Debug, Clone)]
pub struct EventBatch<E> {
    events: Vec<(Offset, E)>,
}

impl<E> EventBatch<E> {
    /// Create a batch from offset/event pairs.
    pub fn new(events: Vec<(Offset, E)>) -> Self {
        Self { events }
    }

    /// An empty batch.
    pub fn empty() -> Self {
        Self { events: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offset of the first event, if any.
    pub fn first_offset(&self) -> Option<Offset> {
        self.events.first().map(|(o, _)| *o)
    }

    /// Offset of the last event, if any.
    pub fn last_offset(&self) -> Option<Offset> {
        self.events.last().map(|(o, _)| *o)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Offset, E)> {
        self.events.iter()
    }
}

impl<E> IntoIterator for EventBatch<E> {
    type Item = (Offset, E);
    type IntoIter = std::vec::IntoIter<(Offset, E)>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Trait for appending events and creating consumers.
#[async_trait]
pub trait EventLog<E>: Send + Sync {
    /// Append an event, returning its offset.
    async fn append(&self, event: E) -> Result<Offset>;

    /// Append several events atomically, returning the offset of the last one.
    async fn append_batch(&self, events: Vec<E>) -> Result<Offset>;

    /// Create a consumer that resumes from the group's committed position.
    async fn consumer(&self, group: &str) -> Result<Box<dyn EventConsumer<E>>>;

    /// Offset that the next appended event will receive.
    fn high_water_mark(&self) -> Offset;
}

/// Trait for polling events with offset tracking.
#[async_trait]
pub trait EventConsumer<E>: Send {
    /// Poll up to `max_count` events.
    async fn poll(&mut self, max_count: usize, timeout: Duration) -> Result<EventBatch<E>>;

    /// Mark `offset` as processed for this consumer group.
    async fn commit(&mut self, offset: Offset) -> Result<()>;

    /// Move the read position.
    async fn seek(&mut self, position: SeekPosition) -> Result<()>;

    /// Last committed offset, if anything has been committed.
    fn committed_offset(&self) -> Option<Offset>;

    /// Consumer group name.
    fn group(&self) -> &str;
}
