//! Two-proportion z-test on click-through rate.
//!
//! Opens are the trials and clicks the successes. The normal CDF is built on
//! the Abramowitz–Stegun 7.1.26 rational approximation of `erf` (absolute
//! error below 1.5e-7). The constants and evaluation order are fixed so that
//! verdicts stay bit-for-bit stable with results computed earlier.

use std::f64::consts::SQRT_2;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::StatisticsConfig;
use crate::metrics::VariantMetrics;
use crate::types::VariantKey;

const A1: f64 = 0.254829592;
const A2: f64 = -0.284496736;
const A3: f64 = 1.421413741;
const A4: f64 = -1.453152027;
const A5: f64 = 1.061405429;
const P: f64 = 0.3275911;

/// Error function approximation.
#[must_use]
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}

/// Standard normal cumulative distribution function.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Discretised confidence level. Serialised as the integer percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SignificanceLevel {
    Ninety5,
    Ninety9,
}

impl SignificanceLevel {
    #[must_use]
    pub fn percent(&self) -> u8 {
        match self {
            Self::Ninety5 => 95,
            Self::Ninety9 => 99,
        }
    }

    /// Bucket a two-tailed p-value. The stricter threshold is checked first.
    #[must_use]
    pub fn from_p_value(p_value: f64, config: &StatisticsConfig) -> Option<Self> {
        if p_value < config.significance_99 {
            Some(Self::Ninety9)
        } else if p_value < config.significance_95 {
            Some(Self::Ninety5)
        } else {
            None
        }
    }
}

impl From<SignificanceLevel> for u8 {
    fn from(level: SignificanceLevel) -> Self {
        level.percent()
    }
}

impl TryFrom<u8> for SignificanceLevel {
    type Error = String;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        match percent {
            95 => Ok(Self::Ninety5),
            99 => Ok(Self::Ninety9),
            other => Err(format!("unsupported significance level {other}")),
        }
    }
}

impl fmt::Display for SignificanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.percent())
    }
}

/// Outcome of a two-proportion z-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZTest {
    pub z: f64,
    pub p_value: f64,
}

/// Run the z-test on a pair of variants.
///
/// Returns `None` when the standard error is zero (pooled proportion of 0 or
/// 1) or either side has no opens; no statement is possible then.
#[must_use]
pub fn two_proportion_z_test(a: &VariantMetrics, b: &VariantMetrics) -> Option<ZTest> {
    if a.opens() == 0 || b.opens() == 0 {
        return None;
    }

    let p1 = a.ctr() / 100.0;
    let p2 = b.ctr() / 100.0;
    let n1 = a.opens() as f64;
    let n2 = b.opens() as f64;

    let pooled = (a.clicks() as f64 + b.clicks() as f64) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();

    if se.is_nan() || se <= 0.0 {
        return None;
    }

    let z = (p1 - p2) / se;
    let p_value = 2.0 * (1.0 - normal_cdf(z.abs()));
    Some(ZTest { z, p_value })
}

/// Winner and significance as stored on a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    pub winner: Option<VariantKey>,
    pub significance: Option<SignificanceLevel>,
}

/// Why an evaluation produced the verdict it did.
///
/// `InsufficientSample` and `DegenerateStatistics` mean "no verdict yet" and
/// must be shown as a running test, never as a tie or an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// At least one variant is below the minimum number of opens.
    InsufficientSample,
    /// Standard error was zero.
    DegenerateStatistics,
    /// Test ran; difference not significant.
    NotSignificant { z: f64, p_value: f64 },
    /// Test ran; difference significant at `level`.
    Significant {
        z: f64,
        p_value: f64,
        level: SignificanceLevel,
    },
    /// Winner decided on CTR gap alone, without a significance test.
    ThresholdOnly { ctr_gap: f64 },
}

impl Outcome {
    /// Whether the statistics were able to say anything.
    #[must_use]
    pub fn has_verdict(&self) -> bool {
        !matches!(self, Self::InsufficientSample | Self::DegenerateStatistics)
    }
}

/// Verdict plus the reasoning behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub outcome: Outcome,
}

impl Evaluation {
    fn unchanged(prior: &Verdict, outcome: Outcome) -> Self {
        Self {
            verdict: *prior,
            outcome,
        }
    }
}

/// Decides significance and winner from both variants' aggregates.
#[derive(Debug, Clone)]
pub struct SignificanceEvaluator {
    config: StatisticsConfig,
}

impl SignificanceEvaluator {
    pub fn new(config: StatisticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StatisticsConfig {
        &self.config
    }

    /// Evaluate the pair against the prior verdict.
    ///
    /// Below the sample gate or with a zero standard error the prior verdict
    /// is returned untouched. Otherwise significance is recomputed from the
    /// p-value; the winner moves to the higher-CTR variant only when the
    /// result is significant and the CTR gap exceeds the configured minimum,
    /// and is otherwise left as it was.
    #[must_use]
    pub fn evaluate(&self, a: &VariantMetrics, b: &VariantMetrics, prior: &Verdict) -> Evaluation {
        let min = self.config.min_sample_size;
        if a.opens() < min || b.opens() < min {
            return Evaluation::unchanged(prior, Outcome::InsufficientSample);
        }

        let Some(ZTest { z, p_value }) = two_proportion_z_test(a, b) else {
            return Evaluation::unchanged(prior, Outcome::DegenerateStatistics);
        };

        let significance = SignificanceLevel::from_p_value(p_value, &self.config);
        let mut winner = prior.winner;
        if significance.is_some() && ctr_gap(a, b) > self.config.min_ctr_gap {
            winner = Some(leader(a, b));
        }

        let outcome = match significance {
            Some(level) => Outcome::Significant { z, p_value, level },
            None => Outcome::NotSignificant { z, p_value },
        };

        Evaluation {
            verdict: Verdict {
                winner,
                significance,
            },
            outcome,
        }
    }
}

/// Absolute CTR difference in percentage points.
#[must_use]
pub fn ctr_gap(a: &VariantMetrics, b: &VariantMetrics) -> f64 {
    (a.ctr() - b.ctr()).abs()
}

/// Variant with the higher CTR; B on an exact tie.
#[must_use]
pub fn leader(a: &VariantMetrics, b: &VariantMetrics) -> VariantKey {
    if a.ctr() > b.ctr() {
        VariantKey::A
    } else {
        VariantKey::B
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn evaluator() -> SignificanceEvaluator {
        SignificanceEvaluator::new(StatisticsConfig::default())
    }

    #[test]
    fn erf_matches_reference_values() {
        assert!(erf(0.0).abs() < 1e-8);
        assert!((erf(0.5) - 0.520_499_877_8).abs() < 2e-7);
        assert!((erf(1.0) - 0.842_700_792_9).abs() < 2e-7);
        assert!((erf(2.0) - 0.995_322_265_0).abs() < 2e-7);
    }

    #[test]
    fn erf_is_odd() {
        for x in [0.1, 0.7, 1.3, 2.9] {
            assert_eq!(erf(-x), -erf(x));
        }
    }

    #[test]
    fn normal_cdf_is_centered_and_symmetric() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-8);
        assert!((normal_cdf(1.959_964) - 0.975).abs() < 1e-6);
        assert!((normal_cdf(1.0) + normal_cdf(-1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn significance_buckets_follow_p_value_thresholds() {
        let config = StatisticsConfig::default();
        assert_eq!(
            SignificanceLevel::from_p_value(0.001, &config),
            Some(SignificanceLevel::Ninety9)
        );
        assert_eq!(
            SignificanceLevel::from_p_value(0.0099, &config),
            Some(SignificanceLevel::Ninety9)
        );
        assert_eq!(
            SignificanceLevel::from_p_value(0.01, &config),
            Some(SignificanceLevel::Ninety5)
        );
        assert_eq!(
            SignificanceLevel::from_p_value(0.049, &config),
            Some(SignificanceLevel::Ninety5)
        );
        assert_eq!(SignificanceLevel::from_p_value(0.05, &config), None);
        assert_eq!(SignificanceLevel::from_p_value(0.7, &config), None);
    }

    #[test]
    fn significance_level_serializes_as_percent() {
        assert_eq!(serde_json::to_string(&SignificanceLevel::Ninety9).unwrap(), "99");
        let parsed: SignificanceLevel = serde_json::from_str("95").unwrap();
        assert_eq!(parsed, SignificanceLevel::Ninety5);
        assert!(serde_json::from_str::<SignificanceLevel>("90").is_err());
    }

    #[test]
    fn z_test_matches_worked_example() {
        let a = VariantMetrics::new(50, 25);
        let b = VariantMetrics::new(50, 10);

        let test = two_proportion_z_test(&a, &b).unwrap();

        assert!((test.z - 3.1449).abs() < 1e-3);
        assert!((test.p_value - 0.00166).abs() < 1e-4);
    }

    #[test]
    fn z_test_is_undefined_when_nobody_clicked() {
        let a = VariantMetrics::new(40, 0);
        let b = VariantMetrics::new(40, 0);
        assert!(two_proportion_z_test(&a, &b).is_none());
    }

    #[test]
    fn z_test_is_undefined_when_everyone_clicked() {
        let a = VariantMetrics::new(40, 40);
        let b = VariantMetrics::new(35, 35);
        assert!(two_proportion_z_test(&a, &b).is_none());
    }

    #[test]
    fn strong_difference_yields_99_and_winner_a() {
        let a = VariantMetrics::new(50, 25);
        let b = VariantMetrics::new(50, 10);

        let evaluation = evaluator().evaluate(&a, &b, &Verdict::default());

        assert_eq!(
            evaluation.verdict.significance,
            Some(SignificanceLevel::Ninety9)
        );
        assert_eq!(evaluation.verdict.winner, Some(VariantKey::A));
        assert!(matches!(
            evaluation.outcome,
            Outcome::Significant {
                level: SignificanceLevel::Ninety9,
                ..
            }
        ));
    }

    #[test]
    fn winner_b_when_b_leads() {
        let a = VariantMetrics::new(60, 6);
        let b = VariantMetrics::new(60, 24);

        let evaluation = evaluator().evaluate(&a, &b, &Verdict::default());

        assert_eq!(evaluation.verdict.winner, Some(VariantKey::B));
    }

    #[test]
    fn below_sample_gate_returns_prior_unchanged() {
        let a = VariantMetrics::new(20, 10);
        let b = VariantMetrics::new(20, 2);
        let prior = Verdict {
            winner: Some(VariantKey::B),
            significance: Some(SignificanceLevel::Ninety5),
        };

        let evaluation = evaluator().evaluate(&a, &b, &prior);

        assert_eq!(evaluation.verdict, prior);
        assert_eq!(evaluation.outcome, Outcome::InsufficientSample);
        assert!(!evaluation.outcome.has_verdict());
    }

    #[test]
    fn gate_applies_when_only_one_side_is_short() {
        let a = VariantMetrics::new(500, 250);
        let b = VariantMetrics::new(29, 1);

        let evaluation = evaluator().evaluate(&a, &b, &Verdict::default());

        assert_eq!(evaluation.verdict, Verdict::default());
        assert_eq!(evaluation.outcome, Outcome::InsufficientSample);
    }

    #[test]
    fn gate_is_inclusive_at_minimum_sample() {
        let a = VariantMetrics::new(30, 20);
        let b = VariantMetrics::new(30, 2);

        let evaluation = evaluator().evaluate(&a, &b, &Verdict::default());

        assert!(evaluation.outcome.has_verdict());
        assert_eq!(evaluation.verdict.winner, Some(VariantKey::A));
    }

    #[test]
    fn zero_standard_error_returns_prior_unchanged() {
        let a = VariantMetrics::new(30, 0);
        let b = VariantMetrics::new(45, 0);
        let prior = Verdict {
            winner: Some(VariantKey::A),
            significance: None,
        };

        let evaluation = evaluator().evaluate(&a, &b, &prior);

        assert_eq!(evaluation.verdict, prior);
        assert_eq!(evaluation.outcome, Outcome::DegenerateStatistics);
    }

    #[test]
    fn small_gap_keeps_prior_winner_even_when_significant() {
        let a = VariantMetrics::new(1000, 101);
        let b = VariantMetrics::new(1000, 99);
        let prior = Verdict {
            winner: Some(VariantKey::B),
            significance: None,
        };

        let evaluation = evaluator().evaluate(&a, &b, &prior);

        assert_eq!(evaluation.verdict.winner, Some(VariantKey::B));
    }

    #[test]
    fn small_gap_with_huge_sample_is_significant_but_sets_no_winner() {
        let a = VariantMetrics::new(2_000_000, 202_000);
        let b = VariantMetrics::new(2_000_000, 198_000);

        let evaluation = evaluator().evaluate(&a, &b, &Verdict::default());

        assert_eq!(
            evaluation.verdict.significance,
            Some(SignificanceLevel::Ninety9)
        );
        assert!(ctr_gap(&a, &b) <= 1.0);
        assert_eq!(evaluation.verdict.winner, None);
    }

    #[test]
    fn losing_significance_clears_level_but_keeps_winner() {
        let a = VariantMetrics::new(100, 12);
        let b = VariantMetrics::new(100, 10);
        let prior = Verdict {
            winner: Some(VariantKey::A),
            significance: Some(SignificanceLevel::Ninety5),
        };

        let evaluation = evaluator().evaluate(&a, &b, &prior);

        assert_eq!(evaluation.verdict.significance, None);
        assert_eq!(evaluation.verdict.winner, Some(VariantKey::A));
        assert!(matches!(evaluation.outcome, Outcome::NotSignificant { .. }));
    }

    #[test]
    fn winner_can_flip_when_data_shifts() {
        let prior = Verdict {
            winner: Some(VariantKey::A),
            significance: Some(SignificanceLevel::Ninety9),
        };
        let a = VariantMetrics::new(200, 20);
        let b = VariantMetrics::new(200, 60);

        let evaluation = evaluator().evaluate(&a, &b, &prior);

        assert_eq!(evaluation.verdict.winner, Some(VariantKey::B));
    }

    #[test]
    fn moderate_difference_lands_in_95_bucket() {
        // p ≈ 0.03 for 20% vs 12% at n = 200 each.
        let a = VariantMetrics::new(200, 40);
        let b = VariantMetrics::new(200, 24);

        let evaluation = evaluator().evaluate(&a, &b, &Verdict::default());

        match evaluation.outcome {
            Outcome::Significant { p_value, level, .. } => {
                assert!(p_value >= 0.01 && p_value < 0.05, "p = {p_value}");
                assert_eq!(level, SignificanceLevel::Ninety5);
            }
            other => panic!("expected significant outcome, got {other:?}"),
        }
        assert_eq!(evaluation.verdict.winner, Some(VariantKey::A));
    }

    #[test]
    fn custom_gate_and_gap_are_respected() {
        let evaluator = SignificanceEvaluator::new(StatisticsConfig {
            min_sample_size: 100,
            min_ctr_gap: 40.0,
            ..StatisticsConfig::default()
        });
        let a = VariantMetrics::new(50, 25);
        let b = VariantMetrics::new(50, 10);

        assert_eq!(
            evaluator.evaluate(&a, &b, &Verdict::default()).outcome,
            Outcome::InsufficientSample
        );

        let a = VariantMetrics::new(100, 50);
        let b = VariantMetrics::new(100, 20);
        let evaluation = evaluator.evaluate(&a, &b, &Verdict::default());
        assert!(evaluation.verdict.significance.is_some());
        assert_eq!(evaluation.verdict.winner, None);
    }

    fn metrics_strategy(max_opens: u64) -> impl Strategy<Value = VariantMetrics> {
        (0..=max_opens)
            .prop_flat_map(|opens| (Just(opens), 0..=opens))
            .prop_map(|(opens, clicks)| VariantMetrics::new(opens, clicks))
    }

    fn verdict_strategy() -> impl Strategy<Value = Verdict> {
        let winner = prop_oneof![
            Just(None::<VariantKey>),
            Just(Some(VariantKey::A)),
            Just(Some(VariantKey::B)),
        ];
        let significance = prop_oneof![
            Just(None::<SignificanceLevel>),
            Just(Some(SignificanceLevel::Ninety5)),
            Just(Some(SignificanceLevel::Ninety9)),
        ];
        (winner, significance).prop_map(|(winner, significance)| Verdict {
            winner,
            significance,
        })
    }

    proptest! {
        #[test]
        fn no_verdict_change_below_sample_gate(
            short in metrics_strategy(29),
            other in metrics_strategy(5_000),
            short_is_a in any::<bool>(),
            prior in verdict_strategy(),
        ) {
            let (a, b) = if short_is_a { (&short, &other) } else { (&other, &short) };

            let evaluation = evaluator().evaluate(a, b, &prior);

            prop_assert_eq!(evaluation.verdict, prior);
            prop_assert_eq!(evaluation.outcome, Outcome::InsufficientSample);
        }

        #[test]
        fn buckets_are_ordered_for_any_p_value(p in 0.0f64..=1.0, q in 0.0f64..=1.0) {
            let config = StatisticsConfig::default();
            let level = SignificanceLevel::from_p_value(p, &config);

            let expected = if p < 0.01 {
                Some(SignificanceLevel::Ninety9)
            } else if p < 0.05 {
                Some(SignificanceLevel::Ninety5)
            } else {
                None
            };
            prop_assert_eq!(level, expected);

            // A smaller p-value never lands in a weaker bucket.
            let (low, high) = if p <= q { (p, q) } else { (q, p) };
            prop_assert!(
                SignificanceLevel::from_p_value(low, &config)
                    >= SignificanceLevel::from_p_value(high, &config)
            );
        }

        #[test]
        fn p_value_is_a_probability_for_any_pair(
            a in metrics_strategy(5_000),
            b in metrics_strategy(5_000),
        ) {
            if let Some(test) = two_proportion_z_test(&a, &b) {
                prop_assert!(test.z.is_finite());
                prop_assert!((0.0..=1.0).contains(&test.p_value));
            }
        }

        #[test]
        fn winner_requires_significance_and_gap(
            a in metrics_strategy(2_000),
            b in metrics_strategy(2_000),
        ) {
            let evaluator = evaluator();
            let evaluation = evaluator.evaluate(&a, &b, &Verdict::default());
            let verdict = evaluation.verdict;
            let both_gates = verdict.significance.is_some()
                && ctr_gap(&a, &b) > evaluator.config().min_ctr_gap;

            if both_gates {
                prop_assert_eq!(verdict.winner, Some(leader(&a, &b)));
            } else {
                prop_assert_eq!(verdict.winner, None);
            }
        }
    }
}
