//! Storage traits for experiments and their results.
//!
//! - [`ExperimentStore`] - Experiment definitions and lifecycle status
//! - [`ResultStore`] - Versioned result snapshots with compare-and-swap
//!
//! Results are derived data: the tracking event log is the source of truth,
//! and a stored result can always be rebuilt by replaying it.

mod memory;

pub use memory::InMemoryExperimentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::experiment::{Experiment, ExperimentStatus};
use crate::result::ExperimentResult;
use crate::types::ExperimentId;

/// A stored value together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Experiment definitions.
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Store a new experiment along with an empty result at version 0.
    async fn insert_experiment(&self, experiment: Experiment) -> Result<()>;

    /// Get an experiment by ID.
    async fn get_experiment(&self, id: ExperimentId) -> Result<Option<Experiment>>;

    /// All experiments owned by `owner_id`, oldest first.
    async fn list_experiments(&self, owner_id: &str) -> Result<Vec<Experiment>>;

    /// Move an experiment to `status`, validating the lifecycle step
    /// against the stored status.
    async fn transition(
        &self,
        id: ExperimentId,
        status: ExperimentStatus,
        at: DateTime<Utc>,
    ) -> Result<Experiment>;
}

/// Current result snapshot per experiment.
///
/// Writers read a [`Versioned`] result, compute the next snapshot and write
/// it back with [`ResultStore::compare_and_swap_result`]. A write based on a
/// stale version fails with
/// [`Error::ConcurrentUpdateConflict`](crate::Error::ConcurrentUpdateConflict)
/// and leaves the stored result untouched.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Current result and its version.
    async fn load_result(&self, id: ExperimentId) -> Result<Versioned<ExperimentResult>>;

    /// Store `result` if the stored version still equals `expected_version`.
    ///
    /// Returns the new version.
    async fn compare_and_swap_result(
        &self,
        id: ExperimentId,
        expected_version: u64,
        result: ExperimentResult,
    ) -> Result<u64>;
}
