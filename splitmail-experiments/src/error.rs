//! Error types for experiment tracking and evaluation.

use splitmail_eventlog::Offset;
use thiserror::Error;
use uuid::Uuid;

use crate::experiment::ExperimentStatus;
use crate::types::ExperimentId;

/// Result type for experiment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting or evaluating tracking events.
///
/// Every input error is raised before any metrics are touched.
#[derive(Debug, Error)]
pub enum Error {
    /// Event type was neither `open` nor `click`.
    #[error("invalid event type '{0}': must be 'open' or 'click'")]
    InvalidEventType(String),

    /// Variant id is not one of the experiment's two versions.
    #[error("template version {variant_id} does not belong to experiment {experiment_id}")]
    UnknownVariant {
        experiment_id: ExperimentId,
        variant_id: String,
    },

    /// The read-modify-write of a result lost a race with another writer.
    #[error(
        "concurrent update on experiment {experiment_id}: expected version {expected}, found {actual}"
    )]
    ConcurrentUpdateConflict {
        experiment_id: ExperimentId,
        expected: u64,
        actual: u64,
    },

    /// The raw event is in the log but the stored result could not be
    /// updated within the retry budget.
    ///
    /// Not retryable: ingesting the event again would log it twice. The
    /// stored result is reconciled by rebuilding it from the log.
    #[error(
        "event {event_id} logged at offset {offset}; experiment {experiment_id} needs a rebuild"
    )]
    ResultPending {
        experiment_id: ExperimentId,
        event_id: Uuid,
        offset: Offset,
    },

    /// Experiment does not exist.
    #[error("experiment not found: {0}")]
    ExperimentNotFound(ExperimentId),

    /// Experiment is no longer running.
    #[error("experiment {id} is {status} and no longer accepts events")]
    ExperimentClosed {
        id: ExperimentId,
        status: ExperimentStatus,
    },

    /// Lifecycle change not allowed from the current status.
    #[error("experiment {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ExperimentId,
        from: ExperimentStatus,
        to: ExperimentStatus,
    },

    /// Experiment definition failed validation.
    #[error("invalid experiment: {0}")]
    InvalidExperiment(String),

    /// Redirect target is not an http(s) URL.
    #[error("invalid redirect URL: {0}")]
    InvalidRedirect(String),

    /// Raw event could not be recorded.
    #[error("event log error: {0}")]
    EventLog(#[from] splitmail_eventlog::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error was caused by the caller's input.
    ///
    /// The HTTP layer maps these to 4xx responses.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEventType(_)
                | Self::UnknownVariant { .. }
                | Self::ExperimentNotFound(_)
                | Self::ExperimentClosed { .. }
                | Self::InvalidTransition { .. }
                | Self::InvalidExperiment(_)
                | Self::InvalidRedirect(_)
        )
    }

    /// Whether retrying with fresh state can succeed.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentUpdateConflict { .. })
    }
}
