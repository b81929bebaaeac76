//! Classification tier for FeedGuard.
//!
//! The reconciliation pass talks to a [`ClassificationAuthority`]. The stock
//! authority is [`TieredAuthority`]: a short-lived edge cache in front of a
//! [`RemoteClassifier`], which in turn is usually a [`ChannelClassifier`]
//! bridging to a background worker.

pub mod authority;
pub mod channel;
pub mod config;
pub mod errors;
pub mod model;
pub mod store;

pub use authority::{ClassificationAuthority, RemoteClassifier, TieredAuthority};
pub use channel::{ChannelClassifier, ClassifyRequest};
pub use config::AuthorityConfig;
pub use errors::ClassificationError;
pub use model::{ClassificationResult, ReportState};
pub use store::{InMemoryReportStore, ReportStateStore};
