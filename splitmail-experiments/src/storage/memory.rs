//! In-memory experiment and result storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ExperimentStore, ResultStore, Versioned};
use crate::error::{Error, Result};
use crate::experiment::{Experiment, ExperimentStatus};
use crate::result::ExperimentResult;
use crate::types::ExperimentId;

struct Entry {
    experiment: Experiment,
    result: Versioned<ExperimentResult>,
}

/// Process-local store implementing both [`ExperimentStore`] and
/// [`ResultStore`].
///
/// Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct InMemoryExperimentStore {
    entries: Arc<RwLock<HashMap<ExperimentId, Entry>>>,
}

impl InMemoryExperimentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExperimentStore for InMemoryExperimentStore {
    async fn insert_experiment(&self, experiment: Experiment) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&experiment.id) {
            return Err(Error::InvalidExperiment(format!(
                "experiment {} already exists",
                experiment.id
            )));
        }

        entries.insert(
            experiment.id,
            Entry {
                experiment,
                result: Versioned {
                    version: 0,
                    value: ExperimentResult::new(),
                },
            },
        );
        Ok(())
    }

    async fn get_experiment(&self, id: ExperimentId) -> Result<Option<Experiment>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&id).map(|entry| entry.experiment.clone()))
    }

    async fn list_experiments(&self, owner_id: &str) -> Result<Vec<Experiment>> {
        let entries = self.entries.read().await;
        let mut experiments: Vec<Experiment> = entries
            .values()
            .filter(|entry| entry.experiment.owner_id == owner_id)
            .map(|entry| entry.experiment.clone())
            .collect();
        experiments.sort_by_key(|e| (e.started_at, e.id.0));
        Ok(experiments)
    }

    async fn transition(
        &self,
        id: ExperimentId,
        status: ExperimentStatus,
        at: DateTime<Utc>,
    ) -> Result<Experiment> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .ok_or(Error::ExperimentNotFound(id))?;

        let from = entry.experiment.status;
        if !from.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                id,
                from,
                to: status,
            });
        }

        entry.experiment.status = status;
        if entry.experiment.ended_at.is_none() {
            entry.experiment.ended_at = Some(at);
        }
        Ok(entry.experiment.clone())
    }
}

#[async_trait]
impl ResultStore for InMemoryExperimentStore {
    async fn load_result(&self, id: ExperimentId) -> Result<Versioned<ExperimentResult>> {
        let entries = self.entries.read().await;
        entries
            .get(&id)
            .map(|entry| entry.result.clone())
            .ok_or(Error::ExperimentNotFound(id))
    }

    async fn compare_and_swap_result(
        &self,
        id: ExperimentId,
        expected_version: u64,
        result: ExperimentResult,
    ) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .ok_or(Error::ExperimentNotFound(id))?;

        let actual = entry.result.version;
        if actual != expected_version {
            return Err(Error::ConcurrentUpdateConflict {
                experiment_id: id,
                expected: expected_version,
                actual,
            });
        }

        entry.result = Versioned {
            version: actual + 1,
            value: result,
        };
        Ok(actual + 1)
    }
}
