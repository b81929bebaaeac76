//! Host document seam for FeedGuard.
//!
//! The reconciliation core never touches a concrete DOM. It talks to the host
//! through [`DocumentTree`] (reads and mutations on opaque [`NodeId`] handles)
//! and [`MutationSource`] (structural change notifications). Selectors are a
//! small CSS subset, enough to express the markup table, matched on top of the
//! tree primitives so every host gets identical precedence semantics.
//!
//! [`MemoryDocument`] implements both traits in-process.

pub mod errors;
pub mod memory;
pub mod mutation;
pub mod selector;
pub mod tree;

pub use errors::SelectorError;
pub use feedguard_core_types::NodeId;
pub use memory::{el, ElementSpec, MemoryDocument};
pub use mutation::{MutationBatch, MutationRecord, MutationSource};
pub use selector::SelectorList;
pub use tree::DocumentTree;
