//! Accumulation of partial per-bug results.
//!
//! Two fetch jobs contribute to every bug: metadata fills seven feature
//! slots, the comment thread fills the other two. The [`Accumulator`] merges
//! them in whatever order they arrive and writes each bug exactly once.

pub mod record;
pub mod store;

pub use record::{BugRecord, FeatureSlot, FeatureVector, SlotUpdate, FEATURE_COUNT};
pub use store::Accumulator;
