//! Metrics module for Prometheus-based monitoring.
//!
//! Counts fetch job outcomes, dataset lines written and data-quality signals
//! (unknown severities) so a run's drop rate is visible without reading logs.
//!
//! # Example
//!
//! ```ignore
//! use bugforge::metrics::{init_metrics, export_metrics};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! // ... run a pipeline ...
//! std::fs::write("metrics.prom", export_metrics())?;
//! ```

pub mod prometheus;

pub use self::prometheus::{
    export_metrics, init_metrics, job_finished, job_started, record_fetch_job,
    record_line_emitted, record_unknown_severity, record_write_failure,
};
