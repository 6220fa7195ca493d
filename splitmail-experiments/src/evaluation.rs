//! Event-to-snapshot evaluation.
//!
//! [`ExperimentEvaluationService`] is the pure core: it takes the current
//! result and one validated event and returns the next result. It performs no
//! I/O and holds no locks; callers own persistence and must serialise the
//! read-modify-write per experiment.

use serde::{Deserialize, Serialize};

use crate::config::StatisticsConfig;
use crate::events::EventSource;
use crate::metrics::EventType;
use crate::result::ExperimentResult;
use crate::significance::{Outcome, SignificanceEvaluator};
use crate::strategy::{SimpleThreshold, StrictSignificance, WinnerStrategy};
use crate::types::VariantKey;

/// Which ingestion path an event came through.
///
/// Each path decides winners with its own strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPath {
    /// Webhook POST; strict significance.
    Webhook,
    /// Tracking-link redirect; CTR gap only.
    Redirect,
}

impl From<EventSource> for EvaluationPath {
    fn from(source: EventSource) -> Self {
        match source {
            EventSource::Webhook => Self::Webhook,
            EventSource::TrackingUrl => Self::Redirect,
        }
    }
}

/// A new snapshot together with the reasoning of its verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub result: ExperimentResult,
    pub outcome: Outcome,
}

/// Folds events into results and re-decides the verdict.
#[derive(Debug, Clone)]
pub struct ExperimentEvaluationService {
    strict: StrictSignificance,
    simple: SimpleThreshold,
}

impl ExperimentEvaluationService {
    pub fn new(config: StatisticsConfig) -> Self {
        let simple = SimpleThreshold::new(config.min_ctr_gap);
        let strict = StrictSignificance::new(SignificanceEvaluator::new(config));
        Self { strict, simple }
    }

    /// Webhook path: aggregate the event, then run the full significance test.
    #[must_use]
    pub fn record_and_evaluate(
        &self,
        result: &ExperimentResult,
        variant: VariantKey,
        event_type: EventType,
    ) -> ExperimentResult {
        self.apply(EvaluationPath::Webhook, result, variant, event_type)
            .result
    }

    /// Redirect path: count a click, then pick a winner on CTR gap alone.
    ///
    /// Significance is carried over untouched.
    #[must_use]
    pub fn record_click_via_redirect(
        &self,
        result: &ExperimentResult,
        variant: VariantKey,
    ) -> ExperimentResult {
        self.apply(EvaluationPath::Redirect, result, variant, EventType::Click)
            .result
    }

    /// Apply one event through the strategy of `path`.
    #[must_use]
    pub fn apply(
        &self,
        path: EvaluationPath,
        result: &ExperimentResult,
        variant: VariantKey,
        event_type: EventType,
    ) -> Evaluated {
        let strategy = self.strategy(path);
        let updated = result.metrics(variant).apply(event_type);
        let next = result.with_metrics(variant, updated);

        let evaluation = strategy.decide(&next.variant_a, &next.variant_b, &result.verdict());

        Evaluated {
            result: next.with_verdict(evaluation.verdict),
            outcome: evaluation.outcome,
        }
    }

    /// Strategy used for `path`.
    pub fn strategy(&self, path: EvaluationPath) -> &dyn WinnerStrategy {
        match path {
            EvaluationPath::Webhook => &self.strict,
            EvaluationPath::Redirect => &self.simple,
        }
    }
}

impl Default for ExperimentEvaluationService {
    fn default() -> Self {
        Self::new(StatisticsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::VariantMetrics;
    use crate::significance::SignificanceLevel;

    fn result_with(a: VariantMetrics, b: VariantMetrics) -> ExperimentResult {
        ExperimentResult {
            variant_a: a,
            variant_b: b,
            ..ExperimentResult::default()
        }
    }

    #[test]
    fn record_and_evaluate_updates_targeted_variant_only() {
        let service = ExperimentEvaluationService::default();
        let result = result_with(VariantMetrics::new(5, 1), VariantMetrics::new(7, 2));

        let next = service.record_and_evaluate(&result, VariantKey::B, EventType::Click);

        assert_eq!(next.variant_a, result.variant_a);
        assert_eq!(next.variant_b.clicks(), 3);
        assert_eq!(next.variant_b.opens(), 7);
    }

    #[test]
    fn record_and_evaluate_does_not_mutate_input() {
        let service = ExperimentEvaluationService::default();
        let result = ExperimentResult::new();

        let _ = service.record_and_evaluate(&result, VariantKey::A, EventType::Open);

        assert_eq!(result, ExperimentResult::new());
    }

    #[test]
    fn record_and_evaluate_is_deterministic() {
        let service = ExperimentEvaluationService::default();
        let result = result_with(VariantMetrics::new(49, 25), VariantMetrics::new(50, 10));

        let first = service.record_and_evaluate(&result, VariantKey::A, EventType::Open);
        let second = service.record_and_evaluate(&result, VariantKey::A, EventType::Open);

        assert_eq!(first, second);
    }

    #[test]
    fn crossing_the_sample_gate_produces_a_verdict() {
        let service = ExperimentEvaluationService::default();
        // A reaches 50 opens / 25 clicks with this event; B already sits at 50 / 10.
        let result = result_with(VariantMetrics::new(49, 25), VariantMetrics::new(50, 10));

        let evaluated = service.apply(
            EvaluationPath::Webhook,
            &result,
            VariantKey::A,
            EventType::Open,
        );

        assert_eq!(evaluated.result.variant_a, VariantMetrics::new(50, 25));
        assert_eq!(
            evaluated.result.significance,
            Some(SignificanceLevel::Ninety9)
        );
        assert_eq!(evaluated.result.winner, Some(VariantKey::A));
        assert!(evaluated.outcome.has_verdict());
    }

    #[test]
    fn below_gate_keeps_prior_winner_and_significance() {
        let service = ExperimentEvaluationService::default();
        let result = ExperimentResult {
            variant_a: VariantMetrics::new(19, 10),
            variant_b: VariantMetrics::new(20, 2),
            winner: Some(VariantKey::B),
            significance: Some(SignificanceLevel::Ninety5),
        };

        let evaluated = service.apply(
            EvaluationPath::Webhook,
            &result,
            VariantKey::A,
            EventType::Open,
        );

        assert_eq!(evaluated.result.winner, Some(VariantKey::B));
        assert_eq!(
            evaluated.result.significance,
            Some(SignificanceLevel::Ninety5)
        );
        assert_eq!(evaluated.outcome, Outcome::InsufficientSample);
    }

    #[test]
    fn redirect_click_sets_winner_without_significance() {
        let service = ExperimentEvaluationService::default();
        // A: 20 opens / 2 clicks (10%), B: 20 opens / 2 clicks (10%).
        // One more click on A lifts it to 15%, 5 points ahead.
        let result = result_with(VariantMetrics::new(20, 2), VariantMetrics::new(20, 2));

        let next = service.record_click_via_redirect(&result, VariantKey::A);

        assert_eq!(next.variant_a.clicks(), 3);
        assert_eq!(next.winner, Some(VariantKey::A));
        assert_eq!(next.significance, None);
    }

    #[test]
    fn redirect_click_of_one_and_a_half_points_sets_winner() {
        let service = ExperimentEvaluationService::default();
        // B: 200 opens / 20 clicks = 10%. A: 200 opens / 22 clicks = 11%.
        // A 23rd click gives 11.5%, a 1.5 point lead.
        let result = result_with(VariantMetrics::new(200, 22), VariantMetrics::new(200, 20));

        let next = service.record_click_via_redirect(&result, VariantKey::A);

        assert!((next.variant_a.ctr() - next.variant_b.ctr() - 1.5).abs() < 1e-9);
        assert_eq!(next.winner, Some(VariantKey::A));

        let strict = service.record_and_evaluate(&result, VariantKey::A, EventType::Click);
        assert_eq!(strict.winner, None);
    }

    #[test]
    fn redirect_click_without_opens_keeps_ctr_at_zero() {
        let service = ExperimentEvaluationService::default();

        let next = service.record_click_via_redirect(&ExperimentResult::new(), VariantKey::B);

        assert_eq!(next.variant_b.clicks(), 1);
        assert_eq!(next.variant_b.ctr(), 0.0);
        assert_eq!(next.winner, None);
    }

    #[test]
    fn redirect_path_preserves_existing_significance() {
        let service = ExperimentEvaluationService::default();
        let result = ExperimentResult {
            variant_a: VariantMetrics::new(100, 10),
            variant_b: VariantMetrics::new(100, 10),
            winner: None,
            significance: Some(SignificanceLevel::Ninety5),
        };

        let next = service.record_click_via_redirect(&result, VariantKey::B);

        assert_eq!(next.significance, Some(SignificanceLevel::Ninety5));
    }

    #[test]
    fn evaluation_path_follows_event_source() {
        assert_eq!(
            EvaluationPath::from(EventSource::Webhook),
            EvaluationPath::Webhook
        );
        assert_eq!(
            EvaluationPath::from(EventSource::TrackingUrl),
            EvaluationPath::Redirect
        );
    }
}
