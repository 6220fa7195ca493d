//! A/B experiment tracking and evaluation for email campaigns.
//!
//! Two template versions of a campaign are sent side by side. Opens and
//! clicks arrive by webhook or through tracking-link redirects, are folded
//! into per-variant metrics, and a winner is declared once the difference in
//! click-through rate is statistically significant.
//!
//! # Architecture
//!
//! - **Core** ([`ExperimentEvaluationService`]) is pure: current result plus
//!   one event in, next result out
//! - **Events** ([`StoredTrackingEvent`]) are the source of truth, appended to
//!   the tracking log before any result changes
//! - **Storage** ([`ExperimentStore`], [`ResultStore`]) holds experiments and
//!   versioned result snapshots
//! - **Tracker** ([`ExperimentTracker`]) validates input, records events and
//!   runs the optimistic read-modify-write of results
//! - **Projector** ([`ResultProjector`]) rebuilds results from the log

mod commands;
pub mod config;
mod consumer;
mod error;
mod evaluation;
mod events;
mod experiment;
mod export;
mod metrics;
mod redirect;
mod result;
pub mod significance;
pub mod storage;
mod strategy;
mod tracker;
mod types;

// Command types
pub use commands::{CreateExperiment, RedirectRequest, WebhookPayload};

// Configuration
pub use config::{EngineConfig, StatisticsConfig, StoreConfig, TrackingConfig};

// Consumer
pub use consumer::ResultProjector;

// Errors
pub use error::{Error, Result};

// Evaluation core
pub use evaluation::{Evaluated, EvaluationPath, ExperimentEvaluationService};
pub use significance::{
    Evaluation, Outcome, SignificanceEvaluator, SignificanceLevel, Verdict, ZTest,
};
pub use strategy::{SimpleThreshold, StrictSignificance, WinnerStrategy};

// Event types
pub use events::{EventSource, StoredTrackingEvent, TrackingEvent, hash_recipient};

// Experiment types
pub use experiment::{Experiment, ExperimentStatus, TrackingUrls, webhook_url};

// Export
pub use export::{ExportDocument, ExportFormat, export_results, render_csv};

// Metric types
pub use metrics::{EventType, VariantMetrics, click_through_rate};

// Redirects
pub use redirect::resolve_redirect;

// Results
pub use result::ExperimentResult;

// Tracker
pub use tracker::{ExperimentTracker, IngestReceipt, RedirectOutcome};

// ID types
pub use types::{ExperimentId, VariantId, VariantKey};

// Storage traits (re-export from storage module)
pub use storage::{ExperimentStore, InMemoryExperimentStore, ResultStore, Versioned};
