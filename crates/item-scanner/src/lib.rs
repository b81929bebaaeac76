//! Item discovery for FeedGuard.
//!
//! - [`markup`]: the single table describing how the host marks up items
//! - [`address`]: identifier extraction from content addresses
//! - [`strategies`]: ordered extraction fallback chain
//! - [`cache`]: bounded, TTL-aware element → identifier cache
//! - [`scanner`]: one combined query per pass, backed by the cache

pub mod address;
pub mod cache;
pub mod config;
pub mod events;
pub mod markup;
pub mod metrics;
pub mod scanner;
pub mod strategies;

pub use address::identifier_from_address;
pub use cache::{Extraction, IdentifierCache};
pub use config::CacheConfig;
pub use markup::{MarkupSources, MarkupTable};
pub use metrics::{ScannerMetrics, ScannerMetricsSnapshot};
pub use scanner::{ItemMap, ItemScanner};
pub use strategies::ExtractStrategy;
