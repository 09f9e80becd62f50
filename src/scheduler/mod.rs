//! Bounded fetch scheduling.
//!
//! - **FetchJob**: one resource to fetch for one bug (metadata or comments)
//! - **FetchQueue**: FIFO of jobs drained with a fixed number in flight
//! - **handlers**: decoding and scoring of fetched documents
//!
//! # Architecture
//!
//! ```text
//!   PipelineDriver ──push──▶ FIFO ──▶ dispatcher ──permit──▶ job task (≤ N)
//!                                                              │
//!                                   BugSource::fetch_json ◀────┤
//!                                                              ▼
//!                                   Accumulator::merge + try_emit ──▶ DatasetWriter
//! ```

pub mod handlers;
pub mod job;
pub mod queue;

pub use job::{FetchJob, JobKind};
pub use queue::{FetchQueue, FetchQueueConfig, QueueError, QueueStats, DEFAULT_CONCURRENCY};
