//! Core identifier types for the experiments engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an A/B experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(pub Uuid);

impl ExperimentId {
    /// Create a new experiment ID with a UUIDv7 (time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ExperimentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ExperimentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of one template version taking part in an experiment.
///
/// Opaque to the engine; owned by the template store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VariantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which side of an experiment a variant sits on.
///
/// Also used as the winner marker of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKey {
    #[serde(rename = "versionA")]
    A,
    #[serde(rename = "versionB")]
    B,
}

impl VariantKey {
    /// Wire representation, matching the serde names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "versionA",
            Self::B => "versionB",
        }
    }

    /// Human-readable label used in exports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "Version A",
            Self::B => "Version B",
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_id_new_generates_uuidv7() {
        let id = ExperimentId::new();
        assert_eq!(id.0.get_version_num(), 7);
    }

    #[test]
    fn experiment_id_parses_its_display_form() {
        let id = ExperimentId::new();
        let parsed: ExperimentId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn experiment_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<ExperimentId>().is_err());
    }

    #[test]
    fn variant_id_blank_counts_as_empty() {
        assert!(VariantId::new("   ").is_empty());
        assert!(!VariantId::new("tv_123").is_empty());
    }

    #[test]
    fn variant_key_uses_version_names_on_the_wire() {
        assert_eq!(serde_json::to_string(&VariantKey::A).unwrap(), "\"versionA\"");
        let parsed: VariantKey = serde_json::from_str("\"versionB\"").unwrap();
        assert_eq!(parsed, VariantKey::B);
    }
}
