//! Winner-determination strategies.
//!
//! Two ingestion paths decide winners differently:
//!
//! - [`StrictSignificance`] (webhook path): sample gate, z-test, then CTR gap.
//! - [`SimpleThreshold`] (tracking-link path): CTR gap only. No sample gate,
//!   no p-value, and the stored significance is left as it was. It can name
//!   a winner on a handful of events, which the strict path never does.

use crate::metrics::VariantMetrics;
use crate::significance::{Evaluation, Outcome, SignificanceEvaluator, Verdict, ctr_gap, leader};

/// Decides the verdict for a pair of variant aggregates.
pub trait WinnerStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Compute the new verdict from both sides and the prior verdict.
    fn decide(&self, a: &VariantMetrics, b: &VariantMetrics, prior: &Verdict) -> Evaluation;
}

/// Full two-proportion z-test with sample gate and CTR gap.
#[derive(Debug, Clone)]
pub struct StrictSignificance {
    evaluator: SignificanceEvaluator,
}

impl StrictSignificance {
    pub fn new(evaluator: SignificanceEvaluator) -> Self {
        Self { evaluator }
    }
}

impl WinnerStrategy for StrictSignificance {
    fn name(&self) -> &'static str {
        "strict_significance"
    }

    fn decide(&self, a: &VariantMetrics, b: &VariantMetrics, prior: &Verdict) -> Evaluation {
        self.evaluator.evaluate(a, b, prior)
    }
}

/// CTR-gap-only winner rule.
#[derive(Debug, Clone)]
pub struct SimpleThreshold {
    min_ctr_gap: f64,
}

impl SimpleThreshold {
    pub fn new(min_ctr_gap: f64) -> Self {
        Self { min_ctr_gap }
    }
}

impl WinnerStrategy for SimpleThreshold {
    fn name(&self) -> &'static str {
        "simple_threshold"
    }

    fn decide(&self, a: &VariantMetrics, b: &VariantMetrics, prior: &Verdict) -> Evaluation {
        let gap = ctr_gap(a, b);
        let winner = if gap > self.min_ctr_gap {
            Some(leader(a, b))
        } else {
            prior.winner
        };

        Evaluation {
            verdict: Verdict {
                winner,
                significance: prior.significance,
            },
            outcome: Outcome::ThresholdOnly { ctr_gap: gap },
        }
    }
}
