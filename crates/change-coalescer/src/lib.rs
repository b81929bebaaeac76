//! Mutation coalescing for FeedGuard.
//!
//! [`ChangeCoalescer`] turns the host's stream of structural change batches
//! into at most one trigger per quiet window. [`wait_for_element`] is the
//! bounded discovery wait used while the host is still rendering a region.

pub mod coalescer;
pub mod config;
pub mod errors;
pub mod wait;

pub use coalescer::{ChangeCoalescer, CoalescedChange, CoalescerState};
pub use config::{CoalescerConfig, DiscoveryConfig};
pub use errors::WaitError;
pub use wait::wait_for_element;
