//! Per-variant aggregate metrics and the event fold that maintains them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of tracking event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Recipient opened the email.
    Open,
    /// Recipient clicked a tracked link.
    Click,
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Click => "click",
        }
    }

    /// Parse the exact wire value. No trimming or case folding.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "click" => Some(Self::Click),
            _ => None,
        }
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidEventType(s.to_string()))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Click-through rate in percent, `0` when there are no opens.
#[must_use]
pub fn click_through_rate(opens: u64, clicks: u64) -> f64 {
    if opens > 0 {
        (clicks as f64 / opens as f64) * 100.0
    } else {
        0.0
    }
}

/// Running aggregate for one variant.
///
/// `ctr` is always derived from `opens` and `clicks`; it is recomputed on
/// construction, on every applied event and on deserialization, so a stale
/// stored value never survives a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredVariantMetrics")]
pub struct VariantMetrics {
    opens: u64,
    clicks: u64,
    ctr: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revenue: Option<f64>,
}

impl VariantMetrics {
    /// Metrics with the given counts and no conversion data.
    #[must_use]
    pub fn new(opens: u64, clicks: u64) -> Self {
        Self {
            opens,
            clicks,
            ctr: click_through_rate(opens, clicks),
            conversions: None,
            revenue: None,
        }
    }

    #[must_use]
    pub fn with_conversions(mut self, conversions: u64) -> Self {
        self.conversions = Some(conversions);
        self
    }

    #[must_use]
    pub fn with_revenue(mut self, revenue: f64) -> Self {
        self.revenue = Some(revenue);
        self
    }

    pub fn opens(&self) -> u64 {
        self.opens
    }

    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    pub fn ctr(&self) -> f64 {
        self.ctr
    }

    pub fn conversions(&self) -> Option<u64> {
        self.conversions
    }

    pub fn revenue(&self) -> Option<f64> {
        self.revenue
    }

    /// Fold one event into a new snapshot.
    ///
    /// Exactly one counter grows by one; conversions and revenue are carried
    /// through untouched.
    #[must_use]
    pub fn apply(&self, event_type: EventType) -> Self {
        let mut next = self.clone();
        match event_type {
            EventType::Open => next.opens = next.opens.saturating_add(1),
            EventType::Click => next.clicks = next.clicks.saturating_add(1),
        }
        next.ctr = click_through_rate(next.opens, next.clicks);
        next
    }

    /// Copy the collaborator-owned fields (conversions, revenue) from `other`.
    #[must_use]
    pub fn with_collaborator_fields_of(mut self, other: &VariantMetrics) -> Self {
        self.conversions = other.conversions;
        self.revenue = other.revenue;
        self
    }
}

/// Loose on-disk shape. Stores written by other services may hold negative
/// or fractional counters; those are clamped instead of rejected.
#[derive(Deserialize)]
struct StoredVariantMetrics {
    #[serde(default)]
    opens: RawCount,
    #[serde(default)]
    clicks: RawCount,
    #[serde(default)]
    conversions: Option<RawCount>,
    #[serde(default)]
    revenue: Option<f64>,
}

impl From<StoredVariantMetrics> for VariantMetrics {
    fn from(stored: StoredVariantMetrics) -> Self {
        let mut metrics = Self::new(stored.opens.clamped(), stored.clicks.clamped());
        metrics.conversions = stored.conversions.map(RawCount::clamped);
        metrics.revenue = stored.revenue;
        metrics
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCount {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Default for RawCount {
    fn default() -> Self {
        Self::Unsigned(0)
    }
}

impl RawCount {
    fn clamped(self) -> u64 {
        match self {
            Self::Unsigned(n) => n,
            Self::Signed(n) => u64::try_from(n).unwrap_or(0),
            Self::Float(f) if f.is_finite() && f > 0.0 => f as u64,
            Self::Float(_) => 0,
        }
    }
}
