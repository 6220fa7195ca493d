//! Results export as CSV or JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::experiment::{Experiment, ExperimentStatus};
use crate::metrics::VariantMetrics;
use crate::result::ExperimentResult;
use crate::types::ExperimentId;

/// Requested export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// `format` query value: missing or `csv` means CSV, anything else JSON.
    #[must_use]
    pub fn parse(format: Option<&str>) -> Self {
        match format {
            None | Some("csv") => Self::Csv,
            Some(_) => Self::Json,
        }
    }
}

/// A rendered export ready to hand to the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub content_type: &'static str,
    /// Attachment filename; only CSV exports are downloaded as files.
    pub filename: Option<String>,
    pub body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    test_id: ExperimentId,
    campaign_name: &'a str,
    status: ExperimentStatus,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    results: &'a ExperimentResult,
}

/// Render `result` for `experiment` in the requested format.
pub fn export_results(
    experiment: &Experiment,
    result: &ExperimentResult,
    format: ExportFormat,
) -> Result<ExportDocument> {
    match format {
        ExportFormat::Csv => Ok(ExportDocument {
            content_type: "text/csv",
            filename: Some(format!("ab-test-{}.csv", experiment.id)),
            body: render_csv(result),
        }),
        ExportFormat::Json => {
            let body = serde_json::to_string(&JsonExport {
                test_id: experiment.id,
                campaign_name: &experiment.campaign_name,
                status: experiment.status,
                start_date: experiment.started_at,
                end_date: experiment.ended_at,
                results: result,
            })?;
            Ok(ExportDocument {
                content_type: "application/json",
                filename: None,
                body,
            })
        }
    }
}

/// CSV summary with one row per metric and the absolute difference.
#[must_use]
pub fn render_csv(result: &ExperimentResult) -> String {
    let a = &result.variant_a;
    let b = &result.variant_b;

    let winner = result.winner.map_or("TBD", |w| w.label());
    let significance = result
        .significance
        .map_or_else(|| "N/A".to_string(), |s| s.percent().to_string());

    [
        "Metric,Version A,Version B,Difference".to_string(),
        count_row("Opens", a.opens(), b.opens()),
        count_row("Clicks", a.clicks(), b.clicks()),
        format!(
            "CTR (%),{:.2},{:.2},{:.2}",
            a.ctr(),
            b.ctr(),
            (a.ctr() - b.ctr()).abs()
        ),
        count_row("Conversions", conversions(a), conversions(b)),
        format!(
            "Revenue,{},{},{}",
            revenue(a),
            revenue(b),
            (revenue(a) - revenue(b)).abs()
        ),
        format!("Winner,{winner}"),
        format!("Statistical Significance,{significance}%"),
    ]
    .join("\n")
}

fn count_row(label: &str, a: u64, b: u64) -> String {
    format!("{label},{a},{b},{}", a.abs_diff(b))
}

fn conversions(metrics: &VariantMetrics) -> u64 {
    metrics.conversions().unwrap_or(0)
}

fn revenue(metrics: &VariantMetrics) -> f64 {
    metrics.revenue().unwrap_or(0.0)
}
