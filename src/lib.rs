//! FeedGuard
//!
//! Keeps a live, host-mutated feed reconciled against a classification
//! authority: flagged items are hidden or annotated, and the markers are
//! rebuilt after every burst of host changes.
//!
//! The workspace crates carry the moving parts; this crate wires them into a
//! [`FeedGuard`] service and owns configuration loading and tracing setup.

pub mod config;
pub mod errors;
pub mod service;
pub mod telemetry;

pub use config::{load_config, load_config_with_options, FeedGuardConfig, LoadOptions, LoggingConfig};
pub use errors::{ConfigError, ServiceError};
pub use service::{FeedGuard, FeedGuardPorts, ServiceMetrics, ServiceState, Trigger};
pub use telemetry::init_tracing;

pub use change_coalescer::{CoalescerConfig, DiscoveryConfig};
pub use classification::{
    AuthorityConfig, ChannelClassifier, ClassificationAuthority, ClassificationError,
    ClassificationResult, ClassifyRequest, InMemoryReportStore, RemoteClassifier, ReportState,
    ReportStateStore, TieredAuthority,
};
pub use feedguard_core_types::{Identifier, NodeId};
pub use feedguard_document::{DocumentTree, MemoryDocument, MutationSource};
pub use item_scanner::{CacheConfig, MarkupSources};
pub use visual_state::{ApplyError, VisualState};
pub use reconcile_pipeline::{
    GateOutcome, MemorySettings, PassReport, PipelineConfig, ReconcileError, SettingsStore,
};
