//! bugforge: labelled feature datasets from bug tracker queries.
//!
//! A search query yields bug ids; for each bug the metadata and the comment
//! thread are fetched concurrently, scored into nine numeric features and
//! appended to a dataset file as one line once every feature is known.

pub mod accumulator;
pub mod bugzilla;
pub mod cli;
pub mod error;
pub mod export;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod scoring;

// Re-export commonly used types
pub use accumulator::{Accumulator, BugRecord, FeatureSlot, FeatureVector};
pub use bugzilla::{BugId, BugSource, BugzillaClient};
pub use error::{ConfigError, DatasetError, FetchError, PipelineError};
pub use export::{DatasetLine, DatasetWriter};
pub use pipeline::{PipelineConfig, PipelineDriver, PipelineReport, QuerySet};
pub use scheduler::{FetchJob, FetchQueue, JobKind};
