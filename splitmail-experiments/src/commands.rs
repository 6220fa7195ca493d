//! Command types for experiment lifecycle and event ingestion.
//!
//! Commands represent intentions to change state. They are processed by
//! [`ExperimentTracker`](crate::tracker::ExperimentTracker), which validates
//! them before anything is recorded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::metrics::EventType;
use crate::types::{ExperimentId, VariantId};

/// Command to start a new experiment.
#[derive(Debug, Clone)]
pub struct CreateExperiment {
    /// Owning user.
    pub owner_id: String,

    /// Human-readable campaign name.
    pub campaign_name: String,

    /// Template version sent as variant A.
    pub variant_a_id: VariantId,

    /// Template version sent as variant B.
    pub variant_b_id: VariantId,

    /// Number of recipients the campaign targets.
    pub audience_size: u64,

    /// Default destination for tracking-link clicks.
    pub redirect_url: Option<String>,
}

impl CreateExperiment {
    /// Reject definitions the tracker cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.campaign_name.trim().is_empty() {
            return Err(Error::InvalidExperiment("campaign name is required".into()));
        }
        if self.variant_a_id.is_empty() || self.variant_b_id.is_empty() {
            return Err(Error::InvalidExperiment(
                "both template versions are required".into(),
            ));
        }
        if self.variant_a_id == self.variant_b_id {
            return Err(Error::InvalidExperiment(
                "template versions must differ".into(),
            ));
        }
        if self.audience_size == 0 {
            return Err(Error::InvalidExperiment(
                "audience size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Body of a webhook POST from an email platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Raw event type; only `open` and `click` are accepted.
    pub event_type: String,

    /// Template version the recipient received.
    #[serde(alias = "variantId")]
    pub template_version_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl WebhookPayload {
    /// Parsed event type.
    pub fn event_type(&self) -> Result<EventType> {
        self.event_type.parse()
    }
}

/// A recipient following a tracking link.
#[derive(Debug, Clone)]
pub struct RedirectRequest {
    pub experiment_id: ExperimentId,

    /// Variant segment of the link path.
    pub variant_id: String,

    /// `redirect` query parameter, if present.
    pub redirect: Option<String>,

    pub user_agent: Option<String>,
}
