//! Experiment lifecycle and event ingestion.
//!
//! [`ExperimentTracker`] is the impure shell around
//! [`ExperimentEvaluationService`]. Every ingestion validates its input,
//! appends the raw event to the tracking log, then folds it into the stored
//! result with an optimistic read-modify-write.
//!
//! The append is the commit point. When the result update runs out of
//! retries the event stays logged and [`Error::ResultPending`] is returned;
//! callers reconcile with [`crate::ResultProjector::rebuild_and_store`]
//! instead of ingesting the event again.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use splitmail_eventlog::{EventLog, Offset};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::commands::{CreateExperiment, RedirectRequest, WebhookPayload};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::evaluation::{Evaluated, EvaluationPath, ExperimentEvaluationService};
use crate::events::{EventSource, StoredTrackingEvent, TrackingEvent, hash_recipient};
use crate::experiment::{Experiment, ExperimentStatus, TrackingUrls, webhook_url};
use crate::export::{ExportDocument, ExportFormat, export_results};
use crate::metrics::EventType;
use crate::redirect::resolve_redirect;
use crate::result::ExperimentResult;
use crate::significance::Outcome;
use crate::storage::{ExperimentStore, ResultStore};
use crate::types::{ExperimentId, VariantKey};

/// What an accepted event did to its experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    /// Identifier of the recorded raw event.
    pub event_id: Uuid,
    /// Position of the raw event in the tracking log.
    pub offset: Offset,
    pub variant: VariantKey,
    pub event_type: EventType,
    /// Result after this event.
    pub result: ExperimentResult,
    /// Why the verdict is what it is.
    pub outcome: Outcome,
    /// Stored result version written by this event.
    pub version: u64,
}

/// Where to send a recipient who followed a tracking link.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectOutcome {
    pub location: Url,
    /// `None` when the experiment no longer accepts events; the recipient is
    /// still redirected.
    pub receipt: Option<IngestReceipt>,
}

/// Manages experiments and folds tracking events into their results.
///
/// Commands validate and record. Queries read from the stores.
pub struct ExperimentTracker {
    experiments: Arc<dyn ExperimentStore>,
    results: Arc<dyn ResultStore>,
    event_log: Arc<dyn EventLog<StoredTrackingEvent>>,
    evaluator: ExperimentEvaluationService,
    config: EngineConfig,
}

impl ExperimentTracker {
    /// Create a new tracker.
    pub fn new(
        experiments: Arc<dyn ExperimentStore>,
        results: Arc<dyn ResultStore>,
        event_log: Arc<dyn EventLog<StoredTrackingEvent>>,
        config: EngineConfig,
    ) -> Self {
        let evaluator = ExperimentEvaluationService::new(config.statistics.clone());
        Self {
            experiments,
            results,
            event_log,
            evaluator,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Commands ===

    /// Start a new experiment.
    ///
    /// The experiment starts running immediately with an empty result.
    #[instrument(skip(self, cmd), fields(campaign = %cmd.campaign_name))]
    pub async fn create_experiment(&self, cmd: CreateExperiment) -> Result<Experiment> {
        cmd.validate()?;

        let id = ExperimentId::new();
        let experiment = Experiment {
            id,
            owner_id: cmd.owner_id,
            campaign_name: cmd.campaign_name,
            tracking_urls: TrackingUrls::build(
                &self.config.tracking.base_url,
                id,
                &cmd.variant_a_id,
                &cmd.variant_b_id,
            ),
            variant_a_id: cmd.variant_a_id,
            variant_b_id: cmd.variant_b_id,
            audience_size: cmd.audience_size,
            status: ExperimentStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            redirect_url: cmd.redirect_url,
        };

        self.experiments.insert_experiment(experiment.clone()).await?;
        info!(experiment_id = %id, "experiment started");
        Ok(experiment)
    }

    /// Stop collecting events. Results are kept as they are.
    pub async fn complete_experiment(&self, id: ExperimentId) -> Result<Experiment> {
        self.transition(id, ExperimentStatus::Completed).await
    }

    /// Archive a running or completed experiment (terminal state).
    pub async fn archive_experiment(&self, id: ExperimentId) -> Result<Experiment> {
        self.transition(id, ExperimentStatus::Archived).await
    }

    #[instrument(skip(self))]
    async fn transition(&self, id: ExperimentId, status: ExperimentStatus) -> Result<Experiment> {
        let experiment = self.experiments.transition(id, status, Utc::now()).await?;
        info!(experiment_id = %id, status = %status, "experiment status changed");
        Ok(experiment)
    }

    /// Record an open or click posted by an email platform.
    ///
    /// The event type and variant are validated before anything is recorded.
    /// Winners are decided by the strict significance strategy.
    #[instrument(skip(self, payload, user_agent), fields(event_type = %payload.event_type))]
    pub async fn ingest_webhook(
        &self,
        id: ExperimentId,
        payload: &WebhookPayload,
        user_agent: Option<&str>,
    ) -> Result<IngestReceipt> {
        let event_type = payload.event_type().inspect_err(reject)?;
        let experiment = self.get_experiment(id).await.inspect_err(reject)?;
        experiment.ensure_accepting_events().inspect_err(reject)?;
        let variant = experiment
            .resolve_variant(&payload.template_version_id)
            .inspect_err(reject)?;

        let event = TrackingEvent {
            experiment_id: id,
            variant_id: experiment.variant_id(variant).clone(),
            variant,
            event_type,
            timestamp: Utc::now(),
            recipient_hash: payload.recipient_email.as_deref().map(hash_recipient),
            user_agent: user_agent.unwrap_or_default().to_string(),
            metadata: payload.metadata.clone().unwrap_or_default(),
            source: EventSource::Webhook,
        };

        self.record(event).await
    }

    /// Record a click from a tracking link and pick the redirect target.
    ///
    /// Winners on this path are decided by CTR gap alone. Links of
    /// experiments that no longer accept events still redirect, without
    /// recording anything.
    #[instrument(
        skip(self, request),
        fields(experiment_id = %request.experiment_id, variant_id = %request.variant_id)
    )]
    pub async fn ingest_redirect(&self, request: RedirectRequest) -> Result<RedirectOutcome> {
        let experiment = self
            .get_experiment(request.experiment_id)
            .await
            .inspect_err(reject)?;
        let variant = experiment
            .resolve_tracking_variant(&request.variant_id)
            .inspect_err(reject)?;
        let location = resolve_redirect(
            request.redirect.as_deref(),
            experiment.redirect_url.as_deref(),
            &self.config.tracking.default_redirect,
        )
        .inspect_err(reject)?;

        if let Err(e) = experiment.ensure_accepting_events() {
            info!(error = %e, "tracking link followed after experiment closed");
            return Ok(RedirectOutcome {
                location,
                receipt: None,
            });
        }

        let mut metadata = Map::new();
        metadata.insert(
            "campaign".to_string(),
            Value::String(experiment.campaign_name.clone()),
        );
        metadata.insert(
            "source".to_string(),
            Value::String(EventSource::TrackingUrl.as_str().to_string()),
        );

        let event = TrackingEvent {
            experiment_id: experiment.id,
            variant_id: experiment.variant_id(variant).clone(),
            variant,
            event_type: EventType::Click,
            timestamp: Utc::now(),
            recipient_hash: None,
            user_agent: request.user_agent.unwrap_or_default(),
            metadata,
            source: EventSource::TrackingUrl,
        };

        let receipt = self.record(event).await?;
        Ok(RedirectOutcome {
            location,
            receipt: Some(receipt),
        })
    }

    /// Append the raw event, then fold it into the stored result.
    ///
    /// A conflict that outlasts the retry budget becomes
    /// [`Error::ResultPending`], since the event is already logged.
    async fn record(&self, event: TrackingEvent) -> Result<IngestReceipt> {
        let id = event.experiment_id;
        let variant = event.variant;
        let event_type = event.event_type;
        let path = EvaluationPath::from(event.source);

        let stored = StoredTrackingEvent::new(event);
        let event_id = stored.event_id;
        let offset = self.event_log.append(stored).await?;
        debug!(%event_id, offset, %variant, %event_type, "tracking event recorded");

        let (evaluated, version) = self
            .update_result(id, path, variant, event_type)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    warn!(%event_id, offset, error = %e, "event logged but result not updated");
                    Error::ResultPending {
                        experiment_id: id,
                        event_id,
                        offset,
                    }
                } else {
                    e
                }
            })?;

        Ok(IngestReceipt {
            event_id,
            offset,
            variant,
            event_type,
            result: evaluated.result,
            outcome: evaluated.outcome,
            version,
        })
    }

    /// Optimistic read-modify-write of the stored result.
    ///
    /// On a version conflict the fresh result is reloaded and the event is
    /// applied again, up to `max_update_retries` attempts in total.
    async fn update_result(
        &self,
        id: ExperimentId,
        path: EvaluationPath,
        variant: VariantKey,
        event_type: EventType,
    ) -> Result<(Evaluated, u64)> {
        let max_attempts = self.config.store.max_update_retries.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let current = self.results.load_result(id).await?;
            let evaluated = self
                .evaluator
                .apply(path, &current.value, variant, event_type);

            match self
                .results
                .compare_and_swap_result(id, current.version, evaluated.result.clone())
                .await
            {
                Ok(version) => {
                    debug!(
                        experiment_id = %id,
                        version,
                        strategy = self.evaluator.strategy(path).name(),
                        outcome = ?evaluated.outcome,
                        winner = ?evaluated.result.winner,
                        "result updated"
                    );
                    return Ok((evaluated, version));
                }
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    warn!(
                        experiment_id = %id,
                        attempt,
                        error = %e,
                        "result update conflicted, retrying"
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    if e.is_conflict() {
                        warn!(
                            experiment_id = %id,
                            attempts = attempt,
                            "giving up on result update"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    // === Queries ===

    /// Get an experiment by ID.
    pub async fn get_experiment(&self, id: ExperimentId) -> Result<Experiment> {
        self.experiments
            .get_experiment(id)
            .await?
            .ok_or(Error::ExperimentNotFound(id))
    }

    /// Experiments owned by `owner_id`.
    pub async fn list_experiments(&self, owner_id: &str) -> Result<Vec<Experiment>> {
        self.experiments.list_experiments(owner_id).await
    }

    /// Current result of an experiment.
    pub async fn results(&self, id: ExperimentId) -> Result<ExperimentResult> {
        Ok(self.results.load_result(id).await?.value)
    }

    /// Render the current result for download.
    pub async fn export(&self, id: ExperimentId, format: ExportFormat) -> Result<ExportDocument> {
        let experiment = self.get_experiment(id).await?;
        let result = self.results(id).await?;
        export_results(&experiment, &result, format)
    }

    /// Webhook endpoint to configure in the email platform.
    pub fn webhook_url(&self, id: ExperimentId) -> String {
        webhook_url(&self.config.tracking.base_url, id)
    }
}

/// Log an ingestion input that was refused before anything was recorded.
fn reject(e: &Error) {
    warn!(error = %e, "tracking event rejected");
}
