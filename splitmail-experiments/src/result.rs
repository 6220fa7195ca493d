//! Evaluation snapshot for one experiment.

use serde::{Deserialize, Serialize};

use crate::metrics::VariantMetrics;
use crate::significance::{SignificanceLevel, Verdict};
use crate::types::VariantKey;

/// Both variants' aggregates plus the current verdict.
///
/// Snapshots are values: every ingested event produces a new one and the
/// previous snapshot is never modified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    #[serde(rename = "versionA", default)]
    pub variant_a: VariantMetrics,
    #[serde(rename = "versionB", default)]
    pub variant_b: VariantMetrics,
    #[serde(default)]
    pub winner: Option<VariantKey>,
    #[serde(rename = "statisticalSignificance", default)]
    pub significance: Option<SignificanceLevel>,
}

impl ExperimentResult {
    /// Empty result for a freshly started experiment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self, key: VariantKey) -> &VariantMetrics {
        match key {
            VariantKey::A => &self.variant_a,
            VariantKey::B => &self.variant_b,
        }
    }

    /// Copy of this result with one side's metrics replaced.
    #[must_use]
    pub fn with_metrics(&self, key: VariantKey, metrics: VariantMetrics) -> Self {
        let mut next = self.clone();
        match key {
            VariantKey::A => next.variant_a = metrics,
            VariantKey::B => next.variant_b = metrics,
        }
        next
    }

    pub fn verdict(&self) -> Verdict {
        Verdict {
            winner: self.winner,
            significance: self.significance,
        }
    }

    #[must_use]
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.winner = verdict.winner;
        self.significance = verdict.significance;
        self
    }
}
