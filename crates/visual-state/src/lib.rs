//! Visual state of host items.
//!
//! State is never stored: an item is `Hidden`, `Annotated` or `Unmarked`
//! depending on the marker classes and overlay elements found in the
//! document. [`VisualStateApplier`] is the only writer of those markers.

pub mod applier;
pub mod errors;

pub use applier::{AnnotateOutcome, ResetSummary, VisualState, VisualStateApplier};
pub use errors::ApplyError;
