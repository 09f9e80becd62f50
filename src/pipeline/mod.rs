//! Pipeline configuration and driving.
//!
//! - **Config**: environment-backed settings and YAML query sets
//! - **Driver**: runs one search query through the fetch queue into a dataset
//!
//! # Example
//!
//! ```rust,ignore
//! use bugforge::bugzilla::BugzillaClient;
//! use bugforge::export::DatasetWriter;
//! use bugforge::pipeline::{PipelineConfig, PipelineDriver};
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::from_env()?;
//! let client = Arc::new(BugzillaClient::new(config.client_config())?);
//! let writer = Arc::new(DatasetWriter::open_append("output.ds").await?);
//!
//! let driver = PipelineDriver::new(client, config.endpoints(), config.queue_config(), writer);
//! let report = driver.start(query_url, 1).wait().await?;
//! println!("{} lines from {} bugs", report.lines_emitted, report.bugs_found);
//! ```

pub mod config;
pub mod driver;

pub use config::{PipelineConfig, QuerySet, QuerySpec, DEFAULT_OUTPUT_FILE};
pub use driver::{PipelineDriver, PipelineHandle, PipelineReport};
