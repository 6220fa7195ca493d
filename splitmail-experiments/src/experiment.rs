//! Experiment records and lifecycle.
//!
//! An experiment pairs two template versions for one campaign. Only running
//! experiments accept tracking events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ExperimentId, VariantId, VariantKey};

/// Current status of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Collecting events
    Running,
    /// Finished; results are final
    Completed,
    /// Hidden from active views (terminal state)
    Archived,
}

impl ExperimentStatus {
    /// Name used on the wire and in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    #[must_use]
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether moving from `self` to `next` is a valid lifecycle step.
    #[must_use]
    pub fn can_transition_to(&self, next: ExperimentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Completed)
                | (Self::Running, Self::Archived)
                | (Self::Completed, Self::Archived)
        )
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-variant tracking links handed out to the email platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUrls {
    pub version_a: String,
    pub version_b: String,
}

impl TrackingUrls {
    /// Build `{base}/t/{variant}/test/{experiment}` for both variants.
    pub fn build(
        base_url: &str,
        experiment_id: ExperimentId,
        variant_a: &VariantId,
        variant_b: &VariantId,
    ) -> Self {
        Self {
            version_a: tracking_url(base_url, experiment_id, variant_a),
            version_b: tracking_url(base_url, experiment_id, variant_b),
        }
    }

    pub fn get(&self, key: VariantKey) -> &str {
        match key {
            VariantKey::A => &self.version_a,
            VariantKey::B => &self.version_b,
        }
    }
}

fn tracking_url(base_url: &str, experiment_id: ExperimentId, variant: &VariantId) -> String {
    format!(
        "{}/t/{}/test/{}",
        base_url.trim_end_matches('/'),
        variant,
        experiment_id
    )
}

/// Webhook endpoint an email platform posts events to.
#[must_use]
pub fn webhook_url(base_url: &str, experiment_id: ExperimentId) -> String {
    format!(
        "{}/api/ab-tests/{}/webhook",
        base_url.trim_end_matches('/'),
        experiment_id
    )
}

/// A two-variant campaign experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique identifier
    pub id: ExperimentId,

    /// Owning user
    pub owner_id: String,

    /// Human-readable campaign name
    pub campaign_name: String,

    /// Template version sent as variant A
    pub variant_a_id: VariantId,

    /// Template version sent as variant B
    pub variant_b_id: VariantId,

    /// Number of recipients the campaign targets
    pub audience_size: u64,

    /// Current status
    pub status: ExperimentStatus,

    /// When the experiment started
    pub started_at: DateTime<Utc>,

    /// When the experiment was completed or archived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Tracking links for both variants
    pub tracking_urls: TrackingUrls,

    /// Where tracking links send recipients when the link names no target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl Experiment {
    pub fn variant_id(&self, key: VariantKey) -> &VariantId {
        match key {
            VariantKey::A => &self.variant_a_id,
            VariantKey::B => &self.variant_b_id,
        }
    }

    /// Map a webhook's template version id to a side of this experiment.
    pub fn resolve_variant(&self, variant_id: &str) -> Result<VariantKey> {
        if variant_id == self.variant_a_id.as_str() {
            Ok(VariantKey::A)
        } else if variant_id == self.variant_b_id.as_str() {
            Ok(VariantKey::B)
        } else {
            Err(self.unknown_variant(variant_id))
        }
    }

    /// Map the variant segment of a tracking link to a side of this experiment.
    ///
    /// Matches against the stored tracking URLs, so a link keeps working as
    /// long as the URL that was handed out contains the same
    /// `/t/{variant}/test/` segment.
    pub fn resolve_tracking_variant(&self, variant_id: &str) -> Result<VariantKey> {
        if variant_id.trim().is_empty() {
            return Err(self.unknown_variant(variant_id));
        }

        let segment = format!("/t/{}/test/", variant_id);
        if self.tracking_urls.version_a.contains(&segment) {
            Ok(VariantKey::A)
        } else if self.tracking_urls.version_b.contains(&segment) {
            Ok(VariantKey::B)
        } else {
            Err(self.unknown_variant(variant_id))
        }
    }

    /// Fail unless the experiment is still collecting events.
    pub fn ensure_accepting_events(&self) -> Result<()> {
        if self.status.accepts_events() {
            Ok(())
        } else {
            Err(Error::ExperimentClosed {
                id: self.id,
                status: self.status,
            })
        }
    }

    fn unknown_variant(&self, variant_id: &str) -> Error {
        Error::UnknownVariant {
            experiment_id: self.id,
            variant_id: variant_id.to_string(),
        }
    }
}
