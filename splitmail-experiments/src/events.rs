//! Raw tracking events.
//!
//! Events are appended to the tracking log before any aggregate changes and
//! are never modified or removed afterwards. Results can be rebuilt by
//! replaying them in log order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use splitmail_eventlog::Partitionable;
use uuid::Uuid;

use crate::metrics::EventType;
use crate::types::{ExperimentId, VariantId, VariantKey};

/// How an event reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// POSTed by an email platform integration.
    Webhook,
    /// Recorded when a recipient followed a tracking link.
    TrackingUrl,
}

impl EventSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::TrackingUrl => "tracking_url",
        }
    }
}

/// A single open or click for one variant of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub experiment_id: ExperimentId,
    pub variant_id: VariantId,
    /// Side the variant id resolved to at ingestion time.
    pub variant: VariantKey,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of the recipient address; the address itself is never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_hash: Option<String>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub source: EventSource,
}

impl Partitionable for TrackingEvent {
    fn partition_key(&self) -> Option<String> {
        Some(self.experiment_id.to_string())
    }
}

/// A TrackingEvent with a globally unique UUIDv7 identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrackingEvent {
    /// Globally unique, time-ordered event identifier (UUIDv7)
    pub event_id: Uuid,
    /// The event payload
    pub event: TrackingEvent,
}

impl StoredTrackingEvent {
    /// Wrap an event with a fresh UUIDv7 identifier.
    #[must_use]
    pub fn new(event: TrackingEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event,
        }
    }

    #[must_use]
    pub fn experiment_id(&self) -> ExperimentId {
        self.event.experiment_id
    }
}

impl Partitionable for StoredTrackingEvent {
    fn partition_key(&self) -> Option<String> {
        self.event.partition_key()
    }
}

/// Hash a recipient address for storage.
///
/// Addresses are trimmed and lower-cased first so the same mailbox always
/// hashes to the same value.
#[must_use]
pub fn hash_recipient(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
