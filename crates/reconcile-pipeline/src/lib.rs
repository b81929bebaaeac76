//! Reconciliation pass for FeedGuard.
//!
//! A pass resets every marker in the content region, rescans, classifies
//! the identifiers it has not dispatched yet and applies hide or annotate to
//! each flagged item. [`SingleFlight`] makes sure at most one pass runs.

pub mod config;
pub mod errors;
pub mod events;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod settings;

pub use config::PipelineConfig;
pub use errors::ReconcileError;
pub use gate::{GateOutcome, SingleFlight};
pub use metrics::{PipelineMetrics, PipelineMetricsSnapshot};
pub use pipeline::{PassReport, PipelinePorts, ReconcilePipeline};
pub use settings::{MemorySettings, SettingsStore};
