//! In-memory EventLog implementation.
//!
//! Events live in process memory without persistence. Consumers share the
//! log's storage, so events appended after a consumer was created are still
//! visible to it, and committed offsets survive across consumers of the same
//! group.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::{Error, Result};
use crate::traits::{EventBatch, EventConsumer, EventLog, Offset, SeekPosition};

/// In-memory implementation of EventLog.
pub struct InMemoryEventLog<E> {
    /// Stored events
    events: Arc<RwLock<Vec<E>>>,
    /// Next offset to assign
    next_offset: AtomicU64,
    /// Next offset to read, per consumer group
    consumer_offsets: Arc<RwLock<HashMap<String, Offset>>>,
    closed: AtomicBool,
}

impl<E> InMemoryEventLog<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Create a new in-memory event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            next_offset: AtomicU64::new(0),
            consumer_offsets: Arc::new(RwLock::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the number of events in the log.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Check if the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Snapshot of every stored event in append order.
    pub async fn events(&self) -> Vec<E> {
        self.events.read().await.clone()
    }

    /// Refuse further appends. Reads keep working.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl<E> Default for InMemoryEventLog<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E> EventLog<E> for InMemoryEventLog<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn append(&self, event: E) -> Result<Offset> {
        self.ensure_open()?;
        let mut events = self.events.write().await;
        events.push(event);
        let len = events.len() as Offset;
        self.next_offset.store(len, Ordering::SeqCst);
        trace!(offset = len - 1, "appended event");
        Ok(len - 1)
    }

    async fn append_batch(&self, batch: Vec<E>) -> Result<Offset> {
        self.ensure_open()?;
        let mut events = self.events.write().await;
        if batch.is_empty() {
            return Ok((events.len() as Offset).saturating_sub(1));
        }

        events.extend(batch);
        let len = events.len() as Offset;
        self.next_offset.store(len, Ordering::SeqCst);
        Ok(len - 1)
    }

    async fn consumer(&self, group: &str) -> Result<Box<dyn EventConsumer<E>>> {
        let start = {
            let offsets = self.consumer_offsets.read().await;
            offsets.get(group).copied().unwrap_or(0)
        };

        Ok(Box::new(InMemoryConsumer {
            group: group.to_string(),
            events: Arc::clone(&self.events),
            current_offset: start,
            committed_offset: start.checked_sub(1),
            log_offsets: Arc::clone(&self.consumer_offsets),
        }))
    }

    fn high_water_mark(&self) -> Offset {
        self.next_offset.load(Ordering::SeqCst)
    }
}

/// In-memory consumer implementation.
struct InMemoryConsumer<E> {
    group: String,
    events: Arc<RwLock<Vec<E>>>,
    current_offset: Offset,
    committed_offset: Option<Offset>,
    log_offsets: Arc<RwLock<HashMap<String, Offset>>>,
}

#[async_trait]
impl<E> EventConsumer<E> for InMemoryConsumer<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn poll(&mut self, max_count: usize, _timeout: Duration) -> Result<EventBatch<E>> {
        let events = self.events.read().await;
        let start = self.current_offset as usize;

        if start >= events.len() {
            return Ok(EventBatch::empty());
        }

        let end = std::cmp::min(start.saturating_add(max_count), events.len());
        let batch: Vec<(Offset, E)> = events[start..end]
            .iter()
            .enumerate()
            .map(|(i, e)| ((start + i) as Offset, e.clone()))
            .collect();

        if let Some((last_offset, _)) = batch.last() {
            self.current_offset = last_offset + 1;
        }

        Ok(EventBatch::new(batch))
    }

    async fn commit(&mut self, offset: Offset) -> Result<()> {
        let high_water_mark = self.events.read().await.len() as Offset;
        if offset >= high_water_mark {
            return Err(Error::InvalidOffset {
                offset,
                high_water_mark,
            });
        }

        self.committed_offset = Some(offset);
        let mut offsets = self.log_offsets.write().await;
        offsets.insert(self.group.clone(), offset + 1);
        Ok(())
    }

    async fn seek(&mut self, position: SeekPosition) -> Result<()> {
        let high_water_mark = self.events.read().await.len() as Offset;
        self.current_offset = match position {
            SeekPosition::Beginning => 0,
            SeekPosition::End => high_water_mark,
            SeekPosition::Offset(offset) if offset <= high_water_mark => offset,
            SeekPosition::Offset(offset) => {
                return Err(Error::InvalidOffset {
                    offset,
                    high_water_mark,
                });
            }
        };
        Ok(())
    }

    fn committed_offset(&self) -> Option<Offset> {
        self.committed_offset
    }

    fn group(&self) -> &str {
        &self.group
    }
}
