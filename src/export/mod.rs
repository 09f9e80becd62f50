//! Export module for feature datasets.
//!
//! Provides the append-only sparse-vector text format consumed by
//! classifier training.

pub mod dataset;

pub use dataset::{load_dataset, DatasetLine, DatasetSummary, DatasetWriter};
