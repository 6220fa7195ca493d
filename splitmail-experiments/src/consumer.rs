//! Result rebuild from the tracking event log.
//!
//! The log is the source of truth for opens and clicks. Replaying an
//! experiment's events in log order through the same strategies as live
//! ingestion reproduces its result; conversions and revenue are owned by
//! other services and are carried over from the stored result.

use std::sync::Arc;
use std::time::Duration;

use splitmail_eventlog::{EventLog, SeekPosition};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::evaluation::{EvaluationPath, ExperimentEvaluationService};
use crate::events::{StoredTrackingEvent, TrackingEvent};
use crate::result::ExperimentResult;
use crate::storage::ResultStore;
use crate::types::ExperimentId;

const REBUILD_GROUP: &str = "results-rebuild";

/// Recomputes experiment results by replaying tracking events.
pub struct ResultProjector {
    event_log: Arc<dyn EventLog<StoredTrackingEvent>>,
    results: Arc<dyn ResultStore>,
    evaluator: ExperimentEvaluationService,
    max_update_retries: u32,
}

impl ResultProjector {
    /// Create a new projector.
    pub fn new(
        event_log: Arc<dyn EventLog<StoredTrackingEvent>>,
        results: Arc<dyn ResultStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            event_log,
            results,
            evaluator: ExperimentEvaluationService::new(config.statistics.clone()),
            max_update_retries: config.store.max_update_retries.max(1),
        }
    }

    /// Fold events into a fresh result, each through the strategy of the
    /// path it arrived on.
    pub fn replay<'a>(
        &self,
        events: impl IntoIterator<Item = &'a TrackingEvent>,
    ) -> ExperimentResult {
        events
            .into_iter()
            .fold(ExperimentResult::new(), |result, event| {
                self.evaluator
                    .apply(
                        EvaluationPath::from(event.source),
                        &result,
                        event.variant,
                        event.event_type,
                    )
                    .result
            })
    }

    /// Replay every logged event of `id` from the beginning of the log.
    ///
    /// The stored result is not touched.
    #[instrument(skip(self))]
    pub async fn rebuild(&self, id: ExperimentId) -> Result<ExperimentResult> {
        let mut consumer = self.event_log.consumer(REBUILD_GROUP).await?;
        consumer.seek(SeekPosition::Beginning).await?;

        let mut events = Vec::new();
        let mut scanned = 0u64;

        loop {
            let batch = consumer.poll(1000, Duration::from_millis(100)).await?;

            if batch.is_empty() {
                break;
            }

            let last = batch.last_offset();
            for (_, stored) in batch {
                scanned += 1;
                if stored.experiment_id() == id {
                    events.push(stored.event);
                }
            }
            if let Some(offset) = last {
                consumer.commit(offset).await?;
            }
        }

        debug!(scanned, matched = events.len(), "replaying experiment events");
        Ok(self.replay(&events))
    }

    /// Rebuild `id` and overwrite its stored result.
    ///
    /// Conversions and revenue of the stored result are kept.
    #[instrument(skip(self))]
    pub async fn rebuild_and_store(&self, id: ExperimentId) -> Result<ExperimentResult> {
        info!("rebuilding result from event log");
        let rebuilt = self.rebuild(id).await?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let current = self.results.load_result(id).await?;
            let merged = ExperimentResult {
                variant_a: rebuilt
                    .variant_a
                    .clone()
                    .with_collaborator_fields_of(&current.value.variant_a),
                variant_b: rebuilt
                    .variant_b
                    .clone()
                    .with_collaborator_fields_of(&current.value.variant_b),
                ..rebuilt.clone()
            };

            match self
                .results
                .compare_and_swap_result(id, current.version, merged.clone())
                .await
            {
                Ok(version) => {
                    info!(version, "result rebuild stored");
                    return Ok(merged);
                }
                Err(e) if e.is_conflict() && attempt < self.max_update_retries => {
                    warn!(attempt, error = %e, "rebuild lost a race, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
